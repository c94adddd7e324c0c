use kgen_canonical::{hash_bytes, CanonicalValue, Canonicalizer, Cid, DigestAlg};
use serde::Serialize;
use tracing::debug;

use crate::error::RenderError;
use crate::functions::{text_of, FunctionTable, InputScope};
use crate::template::{Call, Expr, PathExpr, Primary, Segment, Step, Template};

/// Renders templates against canonicalized contexts.
#[derive(Debug, Clone)]
pub struct Renderer {
    table: FunctionTable,
    canonicalizer: Canonicalizer,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(FunctionTable::standard())
    }
}

impl Renderer {
    /// Renderer restricted to the functions in `table`.
    pub fn new(table: FunctionTable) -> Self {
        Self {
            table,
            canonicalizer: Canonicalizer::default(),
        }
    }

    /// Uses `canonicalizer` (e.g. with ignored fields) for contexts.
    pub fn with_canonicalizer(mut self, canonicalizer: Canonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Function table in effect.
    pub fn functions(&self) -> &FunctionTable {
        &self.table
    }

    /// Parses and checks a template without rendering it.
    pub fn compile(&self, template: &str) -> Result<Template, RenderError> {
        Template::parse(template, &self.table)
    }

    /// Renders `template` with `context`.
    pub fn render<T: Serialize + ?Sized>(
        &self,
        template: &str,
        context: &T,
    ) -> Result<Vec<u8>, RenderError> {
        let compiled = self.compile(template)?;
        self.render_compiled(&compiled, context)
    }

    /// Renders a template and returns the bytes with their content identifier.
    pub fn render_with_cid<T: Serialize + ?Sized>(
        &self,
        template: &str,
        context: &T,
        alg: DigestAlg,
    ) -> Result<(Vec<u8>, Cid), RenderError> {
        let bytes = self.render(template, context)?;
        let cid = hash_bytes(&bytes, alg);
        Ok((bytes, cid))
    }

    /// Renders an already compiled template.
    pub fn render_compiled<T: Serialize + ?Sized>(
        &self,
        template: &Template,
        context: &T,
    ) -> Result<Vec<u8>, RenderError> {
        let root = self.canonicalizer.to_value(context)?;
        let mut out = String::new();
        for segment in &template.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Expr(expr) => out.push_str(&text_of(&self.eval(expr, &root)?)),
            }
        }
        let bytes = normalize_output(&out).into_bytes();
        debug!(
            substitutions = template.substitutions(),
            bytes = bytes.len(),
            "rendered template"
        );
        Ok(bytes)
    }

    fn eval(&self, expr: &Expr, root: &CanonicalValue) -> Result<CanonicalValue, RenderError> {
        let mut value = match &expr.primary {
            Primary::Literal(value) => value.clone(),
            Primary::Path(path) => match resolve(root, path) {
                Some(value) => value.clone(),
                None if expr.filters.first().map(|f| f.name.as_str()) == Some("default") => {
                    CanonicalValue::Null
                }
                None => {
                    return Err(RenderError::UndefinedVariable {
                        path: path.text.clone(),
                        offset: path.offset,
                    })
                }
            },
            Primary::Call(call) => self.apply(call, None, root)?,
        };
        for filter in &expr.filters {
            value = self.apply(filter, Some(value), root)?;
        }
        Ok(value)
    }

    fn apply(
        &self,
        call: &Call,
        input: Option<CanonicalValue>,
        root: &CanonicalValue,
    ) -> Result<CanonicalValue, RenderError> {
        let def = self
            .table
            .get(&call.name)
            .ok_or_else(|| RenderError::UnknownFunction {
                name: call.name.clone(),
                offset: call.offset,
            })?;
        let mut args = call
            .args
            .iter()
            .map(|arg| self.eval(arg, root))
            .collect::<Result<Vec<_>, _>>()?;

        // A template compiled against another table may carry a different arity.
        let result = match (input, def.scope) {
            (Some(input), _) => {
                def.check_arity(args.len())?;
                (def.func)(&input, &args)
            }
            (None, InputScope::Context) => {
                def.check_arity(args.len())?;
                (def.func)(root, &args)
            }
            (None, InputScope::Value) => {
                if args.is_empty() {
                    return Err(RenderError::InvalidArgument {
                        function: call.name.clone(),
                        message: "missing input argument".into(),
                    });
                }
                let input = args.remove(0);
                def.check_arity(args.len())?;
                (def.func)(&input, &args)
            }
        };
        result.map_err(|message| RenderError::InvalidArgument {
            function: call.name.clone(),
            message,
        })
    }
}

fn resolve<'v>(root: &'v CanonicalValue, path: &PathExpr) -> Option<&'v CanonicalValue> {
    path.steps.iter().try_fold(root, |current, step| match step {
        Step::Key(key) => current.get(key),
        Step::Index(idx) => current.index(*idx),
    })
}

/// Line endings to `\n`; trailing spaces and tabs stripped from each line.
pub fn normalize_output(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    unified
        .split('\n')
        .map(|line| line.trim_end_matches([' ', '\t']))
        .collect::<Vec<_>>()
        .join("\n")
}
