//! Polish-notation printer for expression trees, used by the `parse`
//! subcommand and by parser tests.

use crate::ast::{Expr, ExprKind, Lit};

pub struct AstPrinter;

impl AstPrinter {
    pub fn print(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal(lit) => match lit {
                Lit::Number(n) => {
                    if n.fract() == 0.0 && n.is_finite() {
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }
                Lit::Str(s) => s.clone(),
                Lit::True => "true".to_string(),
                Lit::False => "false".to_string(),
                Lit::Nil => "nil".to_string(),
            },

            ExprKind::Grouping(inner) => format!("(group {})", self.print(inner)),

            ExprKind::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, self.print(right))
            }

            ExprKind::Binary {
                left,
                operator,
                right,
            }
            | ExprKind::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                self.print(left),
                self.print(right)
            ),

            ExprKind::Ternary {
                condition,
                then_branch,
                else_branch,
                ..
            } => format!(
                "(?: {} {} {})",
                self.print(condition),
                self.print(then_branch),
                self.print(else_branch)
            ),

            ExprKind::Variable { name } => name.lexeme.clone(),

            ExprKind::Assign { name, value } => {
                format!("(= {} {})", name.lexeme, self.print(value))
            }

            ExprKind::Call {
                callee, arguments, ..
            } => {
                let mut out = format!("(call {}", self.print(callee));
                for argument in arguments {
                    out.push(' ');
                    out.push_str(&self.print(argument));
                }
                out.push(')');
                out
            }

            ExprKind::Get { object, name } => {
                format!("(. {} {})", self.print(object), name.lexeme)
            }

            ExprKind::Set {
                object,
                name,
                value,
            } => format!(
                "(.= {} {} {})",
                self.print(object),
                name.lexeme,
                self.print(value)
            ),

            ExprKind::This { .. } => "this".to_string(),

            ExprKind::Super { method, .. } => format!("(super {})", method.lexeme),

            ExprKind::Lambda { params, .. } => {
                let names: Vec<&str> = params.iter().map(|p| p.lexeme.as_str()).collect();
                format!("(fun ({}))", names.join(" "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn printed(source: &str) -> String {
        let tokens: Vec<_> = Scanner::new(source).filter_map(Result::ok).collect();
        let expr = Parser::new(tokens).parse_expression().unwrap();
        AstPrinter.print(&expr)
    }

    #[test]
    fn unary_and_grouping() {
        assert_eq!(printed("-(1 + 2)"), "(- (group (+ 1.0 2.0)))");
    }

    #[test]
    fn property_chains() {
        assert_eq!(printed("a.b.c"), "(. (. a b) c)");
        assert_eq!(printed("a.b = 1"), "(.= a b 1.0)");
    }

    #[test]
    fn logical_operators() {
        assert_eq!(printed("a or b and c"), "(or a (and b c))");
    }
}
