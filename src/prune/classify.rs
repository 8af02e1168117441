use crate::error::Result;
use crate::terraform::{Address, Directive, StateView};

/// Decides whether `directive` has already taken effect in `state`.
///
/// Without a state every directive counts as applied, so blocks are pruned
/// unconditionally.
pub fn is_applied(directive: &Directive, state: Option<&dyn StateView>) -> Result<bool> {
    let Some(state) = state else {
        return Ok(true);
    };

    let applied = match directive {
        Directive::Moved { from, to } if from.is_module() && to.is_module() => {
            let names = state.list()?;
            let from_exists = module_exists(&names, from);
            let to_exists = module_exists(&names, to);
            tracing::debug!(%from, %to, from_exists, to_exists, "moved module");
            // Applied unless the old module still has resources.
            !from_exists
        }
        Directive::Moved { from, to } => {
            let from_missing = state.lookup(from.as_str())?.is_null();
            let to_missing = state.lookup(to.as_str())?.is_null();
            tracing::debug!(%from, %to, from_missing, to_missing, "moved resource");
            from_missing && !to_missing
        }
        Directive::Import { to, .. } => {
            let exists = !state.lookup(to.as_str())?.is_null();
            tracing::debug!(%to, exists, "import");
            exists
        }
        Directive::Removed { from, .. } if from.is_module() => {
            let exists = module_exists(&state.list()?, from);
            tracing::debug!(%from, exists, "removed module");
            !exists
        }
        Directive::Removed { from, .. } => {
            let exists = !state.lookup(from.as_str())?.is_null();
            tracing::debug!(%from, exists, "removed resource");
            !exists
        }
    };

    Ok(applied)
}

fn module_exists(names: &[String], module: &Address) -> bool {
    let prefix = format!("{}.", module);
    names.iter().any(|name| name.starts_with(&prefix))
}
