//! Lenient status reduction over raw level names.

use formcheck_types::StatusLevel;

/// `worst` over level names as they come from the outside world.
///
/// Unrecognized names are logged and left out of the reduction.
pub fn worst_of_names<S: AsRef<str>>(names: &[S]) -> StatusLevel {
    StatusLevel::worst(names.iter().filter_map(|name| {
        let name = name.as_ref();
        match name.parse::<StatusLevel>() {
            Ok(level) => Some(level),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unknown status level");
                None
            }
        }
    }))
}
