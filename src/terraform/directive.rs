use std::fmt;

use hcl::{Block, Body, Expression};

use super::address::{Address, Identity, resolve, resolve_address, resolve_identity};
use crate::error::{PruneError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Moved,
    Import,
    Removed,
}

impl DirectiveKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "moved" => Some(Self::Moved),
            "import" => Some(Self::Import),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Moved => "moved",
            Self::Import => "import",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    pub destroy: bool,
}

/// One `moved`, `import` or `removed` block from a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Moved {
        from: Address,
        to: Address,
    },
    Import {
        to: Address,
        id: Option<String>,
        identity: Option<Identity>,
    },
    Removed {
        from: Address,
        lifecycle: Option<Lifecycle>,
    },
}

impl Directive {
    /// Extracts a directive from a top-level block.
    ///
    /// Returns `Ok(None)` for blocks that are not directives.
    pub fn from_block(block: &Block) -> Result<Option<Self>> {
        let Some(kind) = DirectiveKind::from_keyword(block.identifier()) else {
            return Ok(None);
        };
        let body = block.body();

        let directive = match kind {
            DirectiveKind::Moved => Directive::Moved {
                from: resolve_address("from", required(body, kind, "from")?)?,
                to: resolve_address("to", required(body, kind, "to")?)?,
            },
            DirectiveKind::Import => Directive::Import {
                to: resolve_address("to", required(body, kind, "to")?)?,
                id: attribute(body, "id").map(|expr| resolve("id", expr)).transpose()?,
                identity: attribute(body, "identity")
                    .map(resolve_identity)
                    .transpose()?,
            },
            DirectiveKind::Removed => Directive::Removed {
                from: resolve_address("from", required(body, kind, "from")?)?,
                lifecycle: lifecycle(body)?,
            },
        };

        Ok(Some(directive))
    }

    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Moved { .. } => DirectiveKind::Moved,
            Directive::Import { .. } => DirectiveKind::Import,
            Directive::Removed { .. } => DirectiveKind::Removed,
        }
    }

    /// Human-readable target, used in logs and reports.
    pub fn describe(&self) -> String {
        match self {
            Directive::Moved { from, to } => format!("{} -> {}", from, to),
            Directive::Import { to, .. } => to.to_string(),
            Directive::Removed { from, .. } => from.to_string(),
        }
    }
}

fn attribute<'a>(body: &'a Body, key: &str) -> Option<&'a Expression> {
    body.attributes()
        .find(|attr| attr.key() == key)
        .map(|attr| attr.expr())
}

fn required<'a>(body: &'a Body, kind: DirectiveKind, key: &str) -> Result<&'a Expression> {
    attribute(body, key).ok_or_else(|| PruneError::MissingAttribute {
        kind: kind.to_string(),
        attribute: key.to_string(),
    })
}

fn lifecycle(body: &Body) -> Result<Option<Lifecycle>> {
    let Some(block) = body.blocks().find(|b| b.identifier() == "lifecycle") else {
        return Ok(None);
    };

    let destroy = match attribute(block.body(), "destroy") {
        None => true,
        Some(Expression::Bool(destroy)) => *destroy,
        Some(other) => match resolve("destroy", other)?.as_str() {
            "true" => true,
            "false" => false,
            _ => {
                return Err(PruneError::UnsupportedExpression {
                    attribute: "destroy".to_string(),
                    found: "non-boolean value".to_string(),
                });
            }
        },
    };

    Ok(Some(Lifecycle { destroy }))
}
