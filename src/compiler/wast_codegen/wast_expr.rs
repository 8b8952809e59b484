//! The output expression tree and its printer.
//!
//! Lowering produces a tree of [`WastExpr`] nodes per function body;
//! emission walks the tree and prints one s-expression per node, nested with
//! two-space indentation. Nodes can carry a note (`function index for ...`)
//! and a span pointing back at the source; both end up in a trailing `;;`
//! comment so the output stays traceable to its input.
//!
//! A node's `ty` is its machine-facing type; `full_ty` is the un-erased
//! source type that selector/index lowering uses to recover aggregate shape.

use crate::compiler::parsers::tokens::TextLocation;
use crate::compiler::wast_codegen::emitter::IndentWriter;
use crate::compiler::wast_codegen::types::{TypeArena, TypeId};

/// Points one emitted expression back at the AST node it came from.
#[derive(Debug, Clone, Copy)]
pub struct Span {
    pub file: usize,
    pub location: TextLocation,
}

/// Everything the printer needs besides the tree itself.
pub struct EmitCx<'a> {
    pub types: &'a TypeArena,
    pub sources: Vec<&'a str>,
}

impl EmitCx<'_> {
    /// The raw (possibly multi-line) source text behind a span.
    pub fn source_slice(&self, span: &Span) -> &str {
        let source = match self.sources.get(span.file) {
            Some(source) => *source,
            None => return "",
        };
        source
            .get(span.location.byte_start..span.location.byte_end)
            .unwrap_or("")
            .trim_end()
    }

    /// The source text behind a span, or `""` if it crosses a line boundary
    /// (inline comments must stay on one line).
    pub fn single_line_source(&self, span: &Span) -> &str {
        let slice = self.source_slice(span);
        if slice.contains('\n') { "" } else { slice }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WastBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl WastBinOp {
    pub fn name(&self) -> &'static str {
        match self {
            WastBinOp::Add => "add",
            WastBinOp::Sub => "sub",
            WastBinOp::Mul => "mul",
            WastBinOp::Div => "div",
            WastBinOp::Eq => "eq",
            WastBinOp::Ne => "ne",
            WastBinOp::Lt => "lt",
            WastBinOp::Le => "le",
            WastBinOp::Gt => "gt",
            WastBinOp::Ge => "ge",
            WastBinOp::And => "and",
            WastBinOp::Or => "or",
            WastBinOp::Xor => "xor",
            WastBinOp::Shl => "shl",
            WastBinOp::Shr => "shr",
        }
    }

    /// Which ops distinguish signed from unsigned operands. The suffix is
    /// only ever applied to integral types; floats never carry one.
    pub fn has_sign_suffix(&self) -> bool {
        matches!(
            self,
            WastBinOp::Div
                | WastBinOp::Lt
                | WastBinOp::Le
                | WastBinOp::Gt
                | WastBinOp::Ge
                | WastBinOp::Shr
        )
    }
}

#[derive(Debug)]
pub enum WastKind {
    /// `(i32.const 17)`
    Const { value: String },
    /// `(get_local $a)`
    GetLocal { name: String },
    /// `(set_local $x <rhs>)`
    SetLocal {
        name: String,
        rhs: Box<WastExpr>,
    },
    /// `(i32.add <x> <y>)`
    BinOp {
        op: WastBinOp,
        x: Box<WastExpr>,
        y: Box<WastExpr>,
    },
    /// `(i32.load <addr>)`
    Load { addr: Box<WastExpr> },
    /// `(i32.store <addr> <value>)`
    Store {
        addr: Box<WastExpr>,
        value: Box<WastExpr>,
    },
    /// `(call $pkg/name <arg>*)`
    Call {
        name: String,
        args: Vec<WastExpr>,
    },
    /// `(call_import $name <arg>*)`
    CallImport {
        name: String,
        args: Vec<WastExpr>,
    },
    /// `(call_indirect $F<k> <index> <arg>*)`
    CallIndirect {
        sig_name: String,
        index: Box<WastExpr>,
        args: Vec<WastExpr>,
    },
    /// A function taken as a value: prints as its table index constant.
    FuncPtr { index: Box<WastExpr> },
    /// `(if <cond> <body>)` / `(if_else <cond> <body> <else>)`
    If {
        cond: Box<WastExpr>,
        body: Box<WastExpr>,
        body_else: Option<Box<WastExpr>>,
    },
    /// `(loop $break $continue <expr>*)`
    Loop {
        label_break: String,
        label_continue: String,
        body: Vec<WastExpr>,
    },
    /// `(br $label)`
    Br { label: String },
    /// `(block <expr>*)`
    Block { body: Vec<WastExpr> },
    /// `(return <value>?)`
    Return { value: Option<Box<WastExpr>> },
    /// `(nop)`
    Nop,
}

#[derive(Debug)]
pub struct WastExpr {
    pub kind: WastKind,
    pub ty: Option<TypeId>,
    pub full_ty: Option<TypeId>,
    pub comment: Option<String>,
    pub span: Option<Span>,
}

impl WastExpr {
    pub fn new(kind: WastKind, ty: Option<TypeId>) -> WastExpr {
        WastExpr {
            kind,
            ty,
            full_ty: None,
            comment: None,
            span: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_full_ty(mut self, full_ty: Option<TypeId>) -> Self {
        self.full_ty = full_ty;
        self
    }

    fn comment_suffix(&self, cx: &EmitCx) -> String {
        let src = match &self.span {
            Some(span) => cx.single_line_source(span),
            None => "",
        };
        if src.is_empty() && self.comment.is_none() {
            return String::new();
        }
        let mut out = String::from(" ;; ");
        out.push_str(src);
        if let Some(comment) = &self.comment {
            if !src.is_empty() {
                out.push_str(" // ");
            }
            out.push_str(comment);
        }
        out
    }

    fn machine_name(&self, cx: &EmitCx) -> &'static str {
        let ty = self
            .ty
            .expect("expression reached the printer without a machine type");
        cx.types.machine_type(ty).name()
    }

    /// Machine prefix for loads and stores. Only 4-byte widths are
    /// implemented; anything else here is an internal bug.
    fn access_prefix(&self, cx: &EmitCx, what: &str) -> &'static str {
        let ty = self
            .ty
            .expect("memory access reached the printer without a type");
        let size = cx.types.size(ty);
        if size != 4 {
            panic!("unimplemented {} width: {} bytes", what, size);
        }
        cx.types.machine_type(ty).name()
    }

    pub fn print(&self, w: &mut IndentWriter, indent: usize, cx: &EmitCx) {
        match &self.kind {
            WastKind::Const { value } => {
                w.print_indent(
                    indent,
                    format!(
                        "({}.const {}){}\n",
                        self.machine_name(cx),
                        value,
                        self.comment_suffix(cx)
                    ),
                );
            }
            WastKind::GetLocal { name } => {
                w.print_indent(
                    indent,
                    format!("(get_local {}){}\n", name, self.comment_suffix(cx)),
                );
            }
            WastKind::SetLocal { name, rhs } => {
                w.print_indent(
                    indent,
                    format!("(set_local {}{}\n", name, self.comment_suffix(cx)),
                );
                rhs.print(w, indent + 1, cx);
                w.print_indent(indent, format!(") ;; set_local {}\n", name));
            }
            WastKind::BinOp { op, x, y } => {
                let ty = self
                    .ty
                    .expect("binary op reached the printer without a type");
                let mut name = format!("{}.{}", self.machine_name(cx), op.name());
                if op.has_sign_suffix() && !cx.types.is_float(ty) {
                    name.push_str(if cx.types.is_signed(ty) { "_s" } else { "_u" });
                }
                w.print_indent(indent, format!("({}{}\n", name, self.comment_suffix(cx)));
                x.print(w, indent + 1, cx);
                y.print(w, indent + 1, cx);
                w.print_indent(indent, format!(") ;; bin op {}\n", op.name()));
            }
            WastKind::Load { addr } => {
                let prefix = self.access_prefix(cx, "load");
                w.print_indent(
                    indent,
                    format!("({}.load{}\n", prefix, self.comment_suffix(cx)),
                );
                addr.print(w, indent + 1, cx);
                w.print_indent(indent, format!(") ;; load{}\n", self.comment_suffix(cx)));
            }
            WastKind::Store { addr, value } => {
                let prefix = self.access_prefix(cx, "store");
                w.print_indent(
                    indent,
                    format!("({}.store{}\n", prefix, self.comment_suffix(cx)),
                );
                addr.print(w, indent + 1, cx);
                value.print(w, indent + 1, cx);
                w.print_indent(indent, format!(") ;; store{}\n", self.comment_suffix(cx)));
            }
            WastKind::Call { name, args } => {
                w.print_indent(
                    indent,
                    format!("(call {}{}\n", name, self.comment_suffix(cx)),
                );
                for arg in args {
                    arg.print(w, indent + 1, cx);
                }
                w.print_indent(indent, format!(") ;; call {}\n", name));
            }
            WastKind::CallImport { name, args } => {
                w.print_indent(
                    indent,
                    format!("(call_import {}{}\n", name, self.comment_suffix(cx)),
                );
                for arg in args {
                    arg.print(w, indent + 1, cx);
                }
                w.print_indent(indent, format!(") ;; call_import {}\n", name));
            }
            WastKind::CallIndirect {
                sig_name,
                index,
                args,
            } => {
                w.print_indent(
                    indent,
                    format!("(call_indirect {}{}\n", sig_name, self.comment_suffix(cx)),
                );
                index.print(w, indent + 1, cx);
                for arg in args {
                    arg.print(w, indent + 1, cx);
                }
                w.print_indent(indent, format!(") ;; call_indirect {}\n", sig_name));
            }
            WastKind::FuncPtr { index } => {
                index.print(w, indent, cx);
            }
            WastKind::If {
                cond,
                body,
                body_else,
            } => {
                if body_else.is_some() {
                    w.print_indent(indent, "(if_else\n");
                } else {
                    w.print_indent(indent, "(if\n");
                }
                cond.print(w, indent + 1, cx);
                body.print(w, indent + 1, cx);
                if let Some(body_else) = body_else {
                    body_else.print(w, indent + 1, cx);
                }
                w.print_indent(indent, ") ;; if\n");
            }
            WastKind::Loop {
                label_break,
                label_continue,
                body,
            } => {
                w.print_indent(
                    indent,
                    format!("(loop ${} ${}\n", label_break, label_continue),
                );
                for expr in body {
                    expr.print(w, indent + 1, cx);
                }
                w.print_indent(indent, ") ;; loop\n");
            }
            WastKind::Br { label } => {
                w.print_indent(indent, format!("(br ${})\n", label));
            }
            WastKind::Block { body } => {
                w.print_indent(indent, "(block\n");
                for expr in body {
                    expr.print(w, indent + 1, cx);
                }
                w.print_indent(indent, ") ;; block\n");
            }
            WastKind::Return { value } => {
                w.print_indent(indent, format!("(return{}\n", self.comment_suffix(cx)));
                if let Some(value) = value {
                    value.print(w, indent + 1, cx);
                }
                w.print_indent(indent, ") ;; return\n");
            }
            WastKind::Nop => {
                w.print_indent(indent, "(nop)\n");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parsers::tokens::TextLocation;

    fn cx(types: &TypeArena) -> EmitCx<'_> {
        EmitCx {
            types,
            sources: Vec::new(),
        }
    }

    #[test]
    fn sign_suffix_applies_to_integral_compares_only() {
        let mut types = TypeArena::new();
        let loc = TextLocation::default();
        let uint32 = types.scalar("uint32", loc).unwrap();
        let float32 = types.scalar("float32", loc).unwrap();

        let gt = WastExpr::new(
            WastKind::BinOp {
                op: WastBinOp::Gt,
                x: Box::new(WastExpr::new(
                    WastKind::GetLocal {
                        name: "$a".to_string(),
                    },
                    Some(uint32),
                )),
                y: Box::new(WastExpr::new(
                    WastKind::GetLocal {
                        name: "$b".to_string(),
                    },
                    Some(uint32),
                )),
            },
            Some(uint32),
        );
        let mut w = IndentWriter::new();
        gt.print(&mut w, 0, &cx(&types));
        assert!(w.as_str().starts_with("(i32.gt_u\n"));

        let flt = WastExpr::new(
            WastKind::BinOp {
                op: WastBinOp::Lt,
                x: Box::new(WastExpr::new(
                    WastKind::Const {
                        value: "1".to_string(),
                    },
                    Some(float32),
                )),
                y: Box::new(WastExpr::new(
                    WastKind::Const {
                        value: "2".to_string(),
                    },
                    Some(float32),
                )),
            },
            Some(float32),
        );
        let mut w = IndentWriter::new();
        flt.print(&mut w, 0, &cx(&types));
        assert!(w.as_str().starts_with("(f32.lt\n"));
    }

    #[test]
    fn add_never_carries_a_sign_suffix() {
        let mut types = TypeArena::new();
        let loc = TextLocation::default();
        let int32 = types.scalar("int32", loc).unwrap();
        let add = WastExpr::new(
            WastKind::BinOp {
                op: WastBinOp::Add,
                x: Box::new(WastExpr::new(
                    WastKind::Const {
                        value: "1".to_string(),
                    },
                    Some(int32),
                )),
                y: Box::new(WastExpr::new(
                    WastKind::Const {
                        value: "2".to_string(),
                    },
                    Some(int32),
                )),
            },
            Some(int32),
        );
        let mut w = IndentWriter::new();
        add.print(&mut w, 0, &cx(&types));
        assert!(w.as_str().starts_with("(i32.add\n"));
    }

    #[test]
    fn notes_become_trailing_comments() {
        let mut types = TypeArena::new();
        let loc = TextLocation::default();
        let int32 = types.scalar("int32", loc).unwrap();
        let c = WastExpr::new(
            WastKind::Const {
                value: "-1".to_string(),
            },
            Some(int32),
        )
        .with_comment("nil function pointer");
        let mut w = IndentWriter::new();
        c.print(&mut w, 0, &cx(&types));
        assert_eq!(w.as_str(), "(i32.const -1) ;; nil function pointer\n");
    }
}
