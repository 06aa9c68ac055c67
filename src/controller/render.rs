//! # Render
//!
//! Builds the variable namespace of each manifest kind from a descriptor and
//! substitutes it into a template.
//!
//! | kind       | variables                                                |
//! |------------|----------------------------------------------------------|
//! | cronjob    | `Ns`, `Tier`, `Name`, `Group`, `Project`, `Schedule`, `ImageTag` |
//! | deployment | `Ns`, `Tier`, `Name`, `Group`, `Project`, `ImageTag`     |
//! | service    | `Ns`, `Tier`, `Name`, `Timeout`                          |

use crate::cluster::ResourceKind;
use crate::controller::descriptor::Descriptor;
use crate::controller::templates::{RenderError, Template};
use std::collections::BTreeMap;

/// Variables visible to a template of `kind`
///
/// # Errors
///
/// Returns [`RenderError::MissingService`] for a service template when the descriptor has no `service` section.
pub fn variables(
    kind: ResourceKind,
    descriptor: &Descriptor,
    image_tag: &str,
) -> Result<BTreeMap<&'static str, String>, RenderError> {
    let mut values = BTreeMap::new();
    values.insert("Ns", descriptor.namespace.clone());
    values.insert("Tier", descriptor.tier.clone());
    values.insert("Name", descriptor.name.clone());

    match kind {
        ResourceKind::CronJob | ResourceKind::Deployment => {
            values.insert("Group", descriptor.repository.group.clone());
            values.insert("Project", descriptor.repository.project.clone());
            values.insert("ImageTag", image_tag.to_string());
            if kind == ResourceKind::CronJob {
                values.insert("Schedule", descriptor.schedule.clone());
            }
        }
        ResourceKind::Service => {
            let service = descriptor
                .service
                .as_ref()
                .ok_or(RenderError::MissingService)?;
            values.insert("Timeout", service.timeout.clone());
        }
    }
    Ok(values)
}

/// Render the manifest text of `kind` for `descriptor`
///
/// # Errors
///
/// Fails when the template can not be rendered, see [`variables`] and [`Template::render`].
pub fn render(
    kind: ResourceKind,
    descriptor: &Descriptor,
    image_tag: &str,
    template: &Template,
) -> Result<String, RenderError> {
    let values = variables(kind, descriptor, image_tag)?;
    template.render(kind, &values)
}
