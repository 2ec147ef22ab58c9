//! Berry rendering of expressions.
//!
//! Rendering is pure: it reads the scope tracker (for receiver kinds and
//! known functions) and the mapping tables, and never records anything.

use crate::ast::*;
use crate::error::TranslateError;
use crate::mappings::MappingTable;
use crate::scope::{ContainerKind, ScopeTracker, infer_container_kind};

/// Renders expressions against the current scope state.
pub struct ExprWriter<'a> {
    table: &'a MappingTable,
    scope: &'a ScopeTracker,
}

impl<'a> ExprWriter<'a> {
    pub fn new(table: &'a MappingTable, scope: &'a ScopeTracker) -> Self {
        Self { table, scope }
    }

    /// Render a full expression (no outer parentheses).
    pub fn render(&self, expr: &Expr) -> Result<String, TranslateError> {
        self.write(expr, false)
    }

    /// Render the test of an `if`/`elif`/`while`.
    ///
    /// A containment test against a collection becomes a method call and is
    /// wrapped in parentheses in this position.
    pub fn render_condition(&self, expr: &Expr) -> Result<String, TranslateError> {
        let text = self.render(expr)?;
        match expr {
            Expr::Compare {
                ops, comparators, ..
            } if matches!(ops.as_slice(), [CmpOp::In | CmpOp::NotIn])
                && comparators.first().is_some_and(|c| !is_literal_collection(c)) =>
            {
                Ok(format!("({text})"))
            }
            _ => Ok(text),
        }
    }

    /// Render an expression in operand position.
    fn operand(&self, expr: &Expr) -> Result<String, TranslateError> {
        self.write(expr, true)
    }

    fn write(&self, expr: &Expr, operand: bool) -> Result<String, TranslateError> {
        let text = match expr {
            Expr::Name(id) => id.clone(),
            Expr::Attribute { value, attr } => format!("{}.{}", self.operand(value)?, attr),
            Expr::Constant(constant) => render_constant(constant),
            Expr::Call {
                func,
                args,
                keywords,
            } => self.write_call(func, args, keywords)?,

            Expr::BinOp { left, op, right } => {
                let token = match op {
                    BinOp::FloorDiv => "/",
                    BinOp::Pow | BinOp::MatMult => {
                        return Err(TranslateError::unsupported(
                            "binary_operator",
                            format!("operator `{}` has no Berry equivalent", op.source_token()),
                        ));
                    }
                    other => other.source_token(),
                };
                format!("{} {} {}", self.operand(left)?, token, self.operand(right)?)
            }

            Expr::UnaryOp { op, operand: inner } => {
                let token = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::Pos => "+",
                    UnaryOp::Invert => "~",
                };
                format!("{}{}", token, self.operand(inner)?)
            }

            Expr::BoolOp { op, values } => {
                let joiner = match op {
                    BoolOp::And => " && ",
                    BoolOp::Or => " || ",
                };
                values
                    .iter()
                    .map(|value| self.operand(value))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(joiner)
            }

            Expr::Compare {
                left,
                ops,
                comparators,
            } => self.write_compare(left, ops, comparators)?,

            Expr::IfExp { test, body, orelse } => format!(
                "{} ? {} : {}",
                self.operand(test)?,
                self.operand(body)?,
                self.operand(orelse)?
            ),

            Expr::Dict(pairs) => {
                let items = pairs
                    .iter()
                    .map(|(key, value)| Ok(format!("{}: {}", self.render(key)?, self.render(value)?)))
                    .collect::<Result<Vec<_>, TranslateError>>()?;
                format!("{{{}}}", items.join(", "))
            }
            Expr::List(items) => format!("[{}]", self.render_list(items)?),
            Expr::Tuple(items) => format!("({})", self.render_list(items)?),
            Expr::Set(_) => {
                return Err(TranslateError::unsupported(
                    "set",
                    "set literal outside a containment test",
                ));
            }

            Expr::Subscript { value, index } => {
                format!("{}[{}]", self.operand(value)?, self.render_index(index)?)
            }
            Expr::Slice { .. } => {
                return Err(TranslateError::unsupported(
                    "slice",
                    "slice outside a subscript",
                ));
            }

            Expr::Lambda { params, body } => {
                let body = self.render(body)?;
                if params.is_empty() {
                    format!("/-> {body}")
                } else {
                    format!("/{} -> {}", params.join(", "), body)
                }
            }

            Expr::TemplateString(parts) => self.write_template(parts)?,

            Expr::Starred(_) => {
                return Err(TranslateError::unsupported(
                    "list_splat",
                    "unpacking with `*`",
                ));
            }
            Expr::Unsupported { kind } => {
                return Err(TranslateError::unsupported(kind.clone(), "expression"));
            }
        };

        if operand && is_compound(expr) {
            Ok(format!("({text})"))
        } else {
            Ok(text)
        }
    }

    fn render_list(&self, items: &[Expr]) -> Result<String, TranslateError> {
        Ok(items
            .iter()
            .map(|item| self.render(item))
            .collect::<Result<Vec<_>, _>>()?
            .join(", "))
    }

    /// Render the inside of `value[...]`.
    pub fn render_index(&self, index: &Expr) -> Result<String, TranslateError> {
        match index {
            Expr::Slice { lower, upper, step } => {
                if step.is_some() {
                    return Err(TranslateError::unsupported(
                        "slice",
                        "slice step has no Berry equivalent",
                    ));
                }
                if is_empty_slice(lower.as_deref(), upper.as_deref()) {
                    return Err(TranslateError::unsupported(
                        "slice",
                        "empty slice has no Berry range equivalent",
                    ));
                }
                let lower = match lower {
                    Some(lower) => self.operand(lower)?,
                    None => "0".to_string(),
                };
                let upper = match upper {
                    Some(upper) => self.inclusive_upper(upper)?,
                    None => "-1".to_string(),
                };
                Ok(format!("{lower}..{upper}"))
            }
            Expr::Tuple(_) => Err(TranslateError::unsupported(
                "subscript",
                "multi-dimensional index",
            )),
            other => self.render(other),
        }
    }

    /// Berry ranges include their upper bound; Python slices do not.
    fn inclusive_upper(&self, upper: &Expr) -> Result<String, TranslateError> {
        if let Some(value) = integer_value(upper) {
            return Ok((value - 1).to_string());
        }
        Ok(format!("{} - 1", self.operand(upper)?))
    }

    fn write_call(
        &self,
        func: &Expr,
        args: &[Expr],
        keywords: &[Keyword],
    ) -> Result<String, TranslateError> {
        let callee = match func {
            Expr::Name(name) if self.table.is_container_class(name) => {
                self.table.resolve_class_name(name).to_string()
            }
            Expr::Attribute { value, attr } => {
                let method = match self.receiver_kind(value).class_name() {
                    Some(class) => self.table.resolve_method_name(class, attr),
                    None => attr.as_str(),
                };
                format!("{}.{}", self.operand(value)?, method)
            }
            other => self.operand(other)?,
        };

        if let Some(keyword) = keywords.first() {
            let kind = if keyword.arg.is_some() {
                "keyword_argument"
            } else {
                "dictionary_splat"
            };
            return Err(TranslateError::unsupported(
                kind,
                format!("keyword arguments in call to `{callee}`"),
            ));
        }

        let args = args
            .iter()
            .map(|arg| self.write_argument(arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("{}({})", callee, args.join(", ")))
    }

    /// References to defined functions are passed as closures.
    fn write_argument(&self, arg: &Expr) -> Result<String, TranslateError> {
        let function = match arg {
            Expr::Name(name) => self.scope.is_known_function(name),
            Expr::Attribute { attr, .. } => self.scope.is_known_function(attr),
            _ => false,
        };
        if function {
            return Ok(format!("/-> {}()", self.render(arg)?));
        }
        self.render(arg)
    }

    fn receiver_kind(&self, receiver: &Expr) -> ContainerKind {
        match receiver.dotted_path() {
            Some(path) => self.scope.lookup_kind(&path),
            None => infer_container_kind(receiver, self.table),
        }
    }

    fn write_compare(
        &self,
        left: &Expr,
        ops: &[CmpOp],
        comparators: &[Expr],
    ) -> Result<String, TranslateError> {
        let mut parts = Vec::with_capacity(ops.len());
        let mut lhs = left;
        for (op, rhs) in ops.iter().zip(comparators) {
            parts.push(self.write_comparison(lhs, *op, rhs)?);
            lhs = rhs;
        }

        if parts.len() == 1 {
            return Ok(parts.remove(0));
        }
        Ok(parts
            .into_iter()
            .map(|part| format!("({part})"))
            .collect::<Vec<_>>()
            .join(" && "))
    }

    fn write_comparison(&self, left: &Expr, op: CmpOp, right: &Expr) -> Result<String, TranslateError> {
        let token = match op {
            CmpOp::Eq | CmpOp::Is => "==",
            CmpOp::NotEq | CmpOp::IsNot => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::In => return self.write_containment(left, right, false),
            CmpOp::NotIn => return self.write_containment(left, right, true),
        };
        Ok(format!("{} {} {}", self.operand(left)?, token, self.operand(right)?))
    }

    fn write_containment(
        &self,
        value: &Expr,
        collection: &Expr,
        negated: bool,
    ) -> Result<String, TranslateError> {
        match collection {
            Expr::List(items) | Expr::Tuple(items) | Expr::Set(items) => {
                if items.is_empty() {
                    return Ok(if negated { "true" } else { "false" }.to_string());
                }
                let (token, joiner) = if negated {
                    ("!=", " && ")
                } else {
                    ("==", " || ")
                };
                let value = self.operand(value)?;
                let parts = items
                    .iter()
                    .map(|item| Ok(format!("{} {} {}", value, token, self.operand(item)?)))
                    .collect::<Result<Vec<_>, TranslateError>>()?;
                Ok(parts.join(joiner))
            }
            Expr::Name(_) | Expr::Attribute { .. } | Expr::Subscript { .. } | Expr::Call { .. } => {
                let call = format!("{}.contains({})", self.operand(collection)?, self.render(value)?);
                Ok(if negated { format!("!{call}") } else { call })
            }
            other => Err(TranslateError::unsupported(
                "comparison_operator",
                format!("containment test against {}", other.kind_name()),
            )),
        }
    }

    fn write_template(&self, parts: &[TemplatePart]) -> Result<String, TranslateError> {
        let has_values = parts
            .iter()
            .any(|part| matches!(part, TemplatePart::Value(_)));

        if !has_values {
            let text: String = parts
                .iter()
                .filter_map(|part| match part {
                    TemplatePart::Literal(text) => Some(text.as_str()),
                    TemplatePart::Value(_) => None,
                })
                .collect();
            return Ok(quote(&text));
        }

        let mut template = String::new();
        let mut values = Vec::new();
        for part in parts {
            match part {
                TemplatePart::Literal(text) => template.push_str(&text.replace('%', "%%")),
                TemplatePart::Value(expr) => {
                    template.push_str("%s");
                    values.push(self.render(expr)?);
                }
            }
        }
        Ok(format!(
            "string.format({}, {})",
            quote(&template),
            values.join(", ")
        ))
    }
}

/// Needs parentheses when nested inside another expression.
fn is_compound(expr: &Expr) -> bool {
    match expr {
        Expr::BinOp { .. }
        | Expr::BoolOp { .. }
        | Expr::Compare { .. }
        | Expr::IfExp { .. }
        | Expr::Lambda { .. } => true,
        Expr::UnaryOp { .. } => !is_signed_number(expr),
        _ => false,
    }
}

fn is_signed_number(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::UnaryOp {
            op: UnaryOp::Neg | UnaryOp::Pos,
            operand,
        } if matches!(
            operand.as_ref(),
            Expr::Constant(Constant::Int(_) | Constant::Float(_))
        )
    )
}

fn is_literal_collection(expr: &Expr) -> bool {
    matches!(expr, Expr::List(_) | Expr::Tuple(_) | Expr::Set(_))
}

/// Bounds that select nothing in Python. Folding them into an inclusive
/// range would select the whole sequence or run backwards.
fn is_empty_slice(lower: Option<&Expr>, upper: Option<&Expr>) -> bool {
    let Some(upper) = upper else {
        return false;
    };
    if integer_value(upper) == Some(0) {
        return true;
    }
    let Some(lower) = lower else {
        return false;
    };
    if lower == upper {
        return true;
    }
    match (integer_value(lower), integer_value(upper)) {
        (Some(lo), Some(hi)) => (lo < 0) == (hi < 0) && hi <= lo,
        _ => false,
    }
}

/// Value of a decimal integer literal, possibly negated.
fn integer_value(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::Constant(Constant::Int(text)) => text.parse().ok(),
        Expr::UnaryOp {
            op: UnaryOp::Neg,
            operand,
        } => integer_value(operand).map(|value| -value),
        _ => None,
    }
}

pub fn render_constant(constant: &Constant) -> String {
    match constant {
        Constant::None => "nil".to_string(),
        Constant::Bool(true) => "true".to_string(),
        Constant::Bool(false) => "false".to_string(),
        Constant::Int(text) | Constant::Float(text) => text.clone(),
        Constant::Str(text) => quote(text),
        Constant::Bytes(data) => {
            let hex: String = data.iter().map(|byte| format!("{byte:02X}")).collect();
            format!("bytes('{hex}')")
        }
    }
}

/// Single-quoted Berry string literal.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
