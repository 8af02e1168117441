//! Canonical addresses reconstructed from HCL attribute expressions.
//!
//! The structured parse gives us expression trees; the raw-text locator sees
//! source tokens. Both sides meet on the canonical string produced here, so
//! the rendering must match how Terraform configuration spells an address:
//! `module.foo["piyo"]`, `aws_instance.web[0]`, `"${local.a}-1"`.

use std::collections::BTreeMap;
use std::fmt;

use hcl::expr::{Expression, ObjectKey, TemplateExpr, Traversal, TraversalOperator};
use hcl::template::{Element, Template};

use crate::error::{PruneError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `module.<name>` style addresses: exactly two dot-separated segments.
    ///
    /// NOTE: nested module paths (`module.a.module.b`) have more segments and
    /// therefore classify as resource-level.
    pub fn is_module(&self) -> bool {
        self.0.split('.').count() == 2
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Content of an `import` block's `identity = { ... }` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Literal(BTreeMap<String, String>),
    /// At least one value is computed; the content cannot be compared.
    Computed,
}

/// Resolves an attribute expression to its canonical string form.
pub fn resolve(attribute: &str, expr: &Expression) -> Result<String> {
    let resolved = match expr {
        Expression::String(value) => Some(value.clone()),
        Expression::Number(number) => Some(number.to_string()),
        Expression::Bool(value) => Some(value.to_string()),
        Expression::Variable(variable) => Some(variable.to_string()),
        Expression::Traversal(traversal) => traversal_path(traversal),
        Expression::TemplateExpr(template) => render_template(template),
        _ => None,
    };

    resolved.ok_or_else(|| unsupported(attribute, expr))
}

pub fn resolve_address(attribute: &str, expr: &Expression) -> Result<Address> {
    resolve(attribute, expr).map(Address)
}

/// Reduces `identity = { key = "value", ... }` to its literal mapping.
pub fn resolve_identity(expr: &Expression) -> Result<Identity> {
    let Expression::Object(object) = expr else {
        return Err(unsupported("identity", expr));
    };

    let mut mapping = BTreeMap::new();
    for (key, value) in object {
        let key = match key {
            ObjectKey::Identifier(ident) => ident.to_string(),
            ObjectKey::Expression(Expression::String(key)) => key.clone(),
            _ => return Ok(Identity::Computed),
        };
        let value = match value {
            Expression::String(value) => value.clone(),
            Expression::Number(number) => number.to_string(),
            Expression::Bool(value) => value.to_string(),
            _ => return Ok(Identity::Computed),
        };
        mapping.insert(key, value);
    }

    Ok(Identity::Literal(mapping))
}

fn traversal_path(traversal: &Traversal) -> Option<String> {
    let mut path = match &traversal.expr {
        Expression::Variable(root) => root.to_string(),
        _ => return None,
    };

    for operator in &traversal.operators {
        match operator {
            TraversalOperator::GetAttr(name) => {
                path.push('.');
                path.push_str(name.as_str());
            }
            TraversalOperator::Index(Expression::String(key)) => {
                path.push_str(&format!("[\"{}\"]", key));
            }
            TraversalOperator::Index(Expression::Number(index)) => {
                path.push_str(&format!("[{}]", index));
            }
            TraversalOperator::LegacyIndex(index) => {
                path.push_str(&format!("[{}]", index));
            }
            _ => return None,
        }
    }

    Some(path)
}

// Interpolations are re-wrapped as `${...}` so the result matches the quoted
// token the raw scanner reads out of the source.
fn render_template(expr: &TemplateExpr) -> Option<String> {
    let template = Template::from_expr(expr).ok()?;

    let mut rendered = String::from("\"");
    for element in template.elements() {
        match element {
            Element::Literal(literal) => rendered.push_str(literal),
            Element::Interpolation(interpolation) => {
                let inner = match &interpolation.expr {
                    Expression::Variable(variable) => variable.to_string(),
                    Expression::Traversal(traversal) => traversal_path(traversal)?,
                    _ => return None,
                };
                rendered.push_str("${");
                rendered.push_str(&inner);
                rendered.push('}');
            }
            _ => return None,
        }
    }
    rendered.push('"');

    Some(rendered)
}

fn unsupported(attribute: &str, expr: &Expression) -> PruneError {
    let found = match expr {
        Expression::Null => "null",
        Expression::Array(_) => "tuple",
        Expression::Object(_) => "object",
        Expression::FuncCall(_) => "function call",
        Expression::Conditional(_) => "conditional",
        Expression::Operation(_) => "operation",
        Expression::ForExpr(_) => "for expression",
        Expression::Parenthesis(_) => "parenthesized expression",
        Expression::Traversal(_) => "traversal with splat or computed index",
        Expression::TemplateExpr(_) => "template with directives",
        _ => "expression",
    };

    PruneError::UnsupportedExpression {
        attribute: attribute.to_string(),
        found: found.to_string(),
    }
}
