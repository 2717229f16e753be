//! Per-stage source buffer with indentation, scopes and interface variable blocks.

use std::collections::{HashMap, HashSet};

use super::node::ShaderPort;

/// Name of the vertex stage.
pub const VERTEX: &str = "vertex";
/// Name of the pixel stage, the only stage of single-stage targets.
pub const PIXEL: &str = "pixel";

const INDENT: &str = "    ";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
/// [ShaderStage] error
pub enum Error {
    #[error("Stage `{stage}` was finalized with {open} scope(s) left open")]
    /// Scopes were opened and never closed.
    UnbalancedScope {
        #[allow(missing_docs)]
        stage: String,
        #[allow(missing_docs)]
        open: usize,
    },

    #[error("Stage `{stage}` closed a scope that was never opened")]
    /// More scopes closed than opened.
    UnmatchedScopeEnd {
        #[allow(missing_docs)]
        stage: String,
    },

    #[error("Variable `{name}` of block `{block}` is already declared as `{existing}`, not `{requested}`")]
    /// Same variable name requested twice with different types.
    VariableConflict {
        #[allow(missing_docs)]
        block: String,
        #[allow(missing_docs)]
        name: String,
        #[allow(missing_docs)]
        existing: String,
        #[allow(missing_docs)]
        requested: String,
    },

    #[error("Block `{block}` already exists with instance name `{existing}`, not `{requested}`")]
    /// Same block name requested twice with different instance names.
    BlockConflict {
        #[allow(missing_docs)]
        block: String,
        #[allow(missing_docs)]
        existing: String,
        #[allow(missing_docs)]
        requested: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Delimiters of a scope.
pub enum Brackets {
    /// Indentation only.
    None,
    /// `{ }`
    Braces,
    /// `( )`
    Parentheses,
    /// `[ ]`
    Squares,
}

impl Brackets {
    fn pair(self) -> Option<(&'static str, &'static str)> {
        match self {
            Brackets::None => None,
            Brackets::Braces => Some(("{", "}")),
            Brackets::Parentheses => Some(("(", ")")),
            Brackets::Squares => Some(("[", "]")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Role of a [VariableBlock] in the stage interface.
pub enum BlockKind {
    /// Values set by the host.
    Uniform,
    /// Values received from the previous stage or the vertex buffers.
    Input,
    /// Values sent to the next stage or the framebuffer.
    Output,
    /// Compile-time constants.
    Constant,
}

#[derive(Clone, Debug)]
/// Named, ordered set of interface variables.
pub struct VariableBlock {
    kind: BlockKind,
    name: String,
    instance: String,
    variables: Vec<ShaderPort>,
    index: HashMap<String, usize>,
}

impl VariableBlock {
    /// Empty block; `instance` is the name the block is accessed through, if any.
    pub fn new(kind: BlockKind, name: &str, instance: &str) -> Self {
        Self {
            kind,
            name: name.to_owned(),
            instance: instance.to_owned(),
            variables: Vec::new(),
            index: HashMap::new(),
        }
    }

    #[allow(missing_docs)]
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[allow(missing_docs)]
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Add a variable, keyed by its [variable](ShaderPort::variable) name.
    ///
    /// Adding the same variable twice is a no-op returning the existing entry, adding it with
    /// another type is an error.
    pub fn add(&mut self, port: ShaderPort) -> Result<&ShaderPort, Error> {
        if let Some(&index) = self.index.get(&port.variable) {
            let existing = &self.variables[index];
            if existing.ty != port.ty {
                return Err(Error::VariableConflict {
                    block: self.name.clone(),
                    name: port.variable,
                    existing: existing.ty.name().to_owned(),
                    requested: port.ty.name().to_owned(),
                });
            }
            return Ok(existing);
        }

        self.index.insert(port.variable.clone(), self.variables.len());
        self.variables.push(port);
        Ok(&self.variables[self.variables.len() - 1])
    }

    #[allow(missing_docs)]
    pub fn get(&self, variable: &str) -> Option<&ShaderPort> {
        self.index.get(variable).map(|&index| &self.variables[index])
    }

    #[allow(missing_docs)]
    pub fn contains(&self, variable: &str) -> bool {
        self.index.contains_key(variable)
    }

    /// Variables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ShaderPort> {
        self.variables.iter()
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[derive(Clone, Debug)]
/// One stage of a shader being emitted: its source buffer and its interface.
pub struct ShaderStage {
    name: String,
    comment: String,
    code: String,
    indentation: usize,
    scopes: Vec<Brackets>,
    blocks: Vec<VariableBlock>,
    function_definitions: HashSet<String>,
    emitted: HashSet<String>,
    declared: HashSet<String>,
}

impl ShaderStage {
    /// Empty stage; `comment` is the single-line comment prefix of the target language.
    pub fn new(name: &str, comment: &str) -> Self {
        Self {
            name: name.to_owned(),
            comment: comment.to_owned(),
            code: String::new(),
            indentation: 0,
            scopes: Vec::new(),
            blocks: Vec::new(),
            function_definitions: HashSet::new(),
            emitted: HashSet::new(),
            declared: HashSet::new(),
        }
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source emitted so far.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Number of scopes currently open.
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Start a line at the current indentation.
    pub fn begin_line(&mut self) {
        for _ in 0..self.indentation {
            self.code.push_str(INDENT);
        }
    }

    /// Append raw text to the current line.
    pub fn add_string(&mut self, text: &str) {
        self.code.push_str(text);
    }

    /// Terminate the current line.
    pub fn end_line(&mut self, semicolon: bool) {
        if semicolon {
            self.code.push(';');
        }
        self.new_line();
    }

    /// Emit a complete, indented line.
    pub fn add_line(&mut self, text: &str, semicolon: bool) {
        self.begin_line();
        self.add_string(text);
        self.end_line(semicolon);
    }

    #[allow(missing_docs)]
    pub fn new_line(&mut self) {
        self.code.push('\n');
    }

    /// Emit a single-line comment.
    pub fn add_comment(&mut self, text: &str) {
        self.begin_line();
        let comment = format!("{} {text}", self.comment);
        self.add_string(&comment);
        self.new_line();
    }

    /// Emit a multi-line block of code, indenting every line.
    pub fn add_block(&mut self, text: &str) {
        for line in text.lines() {
            if line.is_empty() {
                self.new_line();
            } else {
                self.add_line(line, false);
            }
        }
    }

    /// Open a scope on its own line and indent what follows.
    pub fn begin_scope(&mut self, brackets: Brackets) {
        if let Some((open, _)) = brackets.pair() {
            self.add_line(open, false);
        }
        self.indentation += 1;
        self.scopes.push(brackets);
    }

    /// Close the innermost scope.
    pub fn end_scope(&mut self, semicolon: bool, newline: bool) -> Result<(), Error> {
        let brackets = self.scopes.pop().ok_or_else(|| Error::UnmatchedScopeEnd {
            stage: self.name.clone(),
        })?;
        self.indentation -= 1;

        if let Some((_, close)) = brackets.pair() {
            self.begin_line();
            self.add_string(close);
            if semicolon {
                self.add_string(";");
            }
            if newline {
                self.new_line();
            }
        }

        Ok(())
    }

    /// Record a function definition; returns `false` if it was already emitted in this stage.
    pub fn add_function_definition(&mut self, function: &str) -> bool {
        self.function_definitions.insert(function.to_owned())
    }

    #[allow(missing_docs)]
    pub fn has_function_definition(&self, function: &str) -> bool {
        self.function_definitions.contains(function)
    }

    /// Record a one-off piece of emitted code by key; returns `false` if already emitted.
    pub fn mark_emitted(&mut self, key: &str) -> bool {
        self.emitted.insert(key.to_owned())
    }

    /// Record a local variable declaration; returns `false` if it was already declared.
    pub fn declare(&mut self, variable: &str) -> bool {
        self.declared.insert(variable.to_owned())
    }

    #[allow(missing_docs)]
    pub fn is_declared(&self, variable: &str) -> bool {
        self.declared.contains(variable)
    }

    /// Start a new function body, returning the declarations of the enclosing one.
    pub fn enter_function(&mut self) -> HashSet<String> {
        std::mem::take(&mut self.declared)
    }

    /// Declarations visible so far, to restore when leaving a nested scope.
    pub fn save_declarations(&self) -> HashSet<String> {
        self.declared.clone()
    }

    /// Restore declarations returned by [enter_function](Self::enter_function) or
    /// [save_declarations](Self::save_declarations).
    pub fn restore_declarations(&mut self, declared: HashSet<String>) {
        self.declared = declared;
    }

    /// Get or create a block. Creating an existing block with another instance name fails.
    pub fn create_block(
        &mut self,
        kind: BlockKind,
        name: &str,
        instance: &str,
    ) -> Result<&mut VariableBlock, Error> {
        match self.blocks.iter().position(|block| block.name == name) {
            Some(index) => {
                let block = &mut self.blocks[index];
                if block.instance != instance {
                    return Err(Error::BlockConflict {
                        block: name.to_owned(),
                        existing: block.instance.clone(),
                        requested: instance.to_owned(),
                    });
                }
                Ok(block)
            }
            None => {
                self.blocks.push(VariableBlock::new(kind, name, instance));
                let last = self.blocks.len() - 1;
                Ok(&mut self.blocks[last])
            }
        }
    }

    #[allow(missing_docs)]
    pub fn block(&self, name: &str) -> Option<&VariableBlock> {
        self.blocks.iter().find(|block| block.name == name)
    }

    #[allow(missing_docs)]
    pub fn block_mut(&mut self, name: &str) -> Option<&mut VariableBlock> {
        self.blocks.iter_mut().find(|block| block.name == name)
    }

    /// Blocks of one kind, in creation order.
    pub fn blocks(&self, kind: BlockKind) -> impl Iterator<Item = &VariableBlock> {
        self.blocks.iter().filter(move |block| block.kind == kind)
    }

    /// Check that the stage is complete.
    pub fn finalize(&self) -> Result<(), Error> {
        if self.scopes.is_empty() {
            Ok(())
        } else {
            Err(Error::UnbalancedScope {
                stage: self.name.clone(),
                open: self.scopes.len(),
            })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{names, TypeRegistry};

    #[test]
    fn scopes_indent() {
        let mut stage = ShaderStage::new(PIXEL, "//");

        stage.add_line("void main()", false);
        stage.begin_scope(Brackets::Braces);
        stage.add_line("float a = 1.0", true);
        stage.add_comment("done");
        stage.end_scope(false, true).unwrap();

        assert_eq!(
            stage.code(),
            "void main()\n{\n    float a = 1.0;\n    // done\n}\n"
        );
        assert!(stage.finalize().is_ok());
    }

    #[test]
    fn unbalanced_scopes() {
        let mut stage = ShaderStage::new(PIXEL, "//");

        stage.begin_scope(Brackets::Braces);
        assert_eq!(
            stage.finalize(),
            Err(Error::UnbalancedScope {
                stage: PIXEL.to_owned(),
                open: 1
            })
        );

        stage.end_scope(true, true).unwrap();
        assert_eq!(
            stage.end_scope(false, false),
            Err(Error::UnmatchedScopeEnd {
                stage: PIXEL.to_owned()
            })
        );
    }

    #[test]
    fn blocks_are_idempotent() {
        let registry = TypeRegistry::initialize();
        let float = registry.get(names::FLOAT).unwrap();
        let color3 = registry.get(names::COLOR3).unwrap();
        let mut stage = ShaderStage::new(VERTEX, "//");

        let block = stage
            .create_block(BlockKind::Output, "VertexData", "vd")
            .unwrap();
        block
            .add(ShaderPort::new("weight", float.clone()).with_variable("weight"))
            .unwrap();
        block
            .add(ShaderPort::new("weight", float).with_variable("weight"))
            .unwrap();
        assert_eq!(block.len(), 1);

        assert!(matches!(
            block.add(ShaderPort::new("weight", color3).with_variable("weight")),
            Err(Error::VariableConflict { .. })
        ));

        assert_eq!(stage.block("VertexData").unwrap().len(), 1);
        assert!(matches!(
            stage.create_block(BlockKind::Output, "VertexData", "other"),
            Err(Error::BlockConflict { .. })
        ));
    }

    #[test]
    fn function_definitions_are_deduplicated() {
        let mut stage = ShaderStage::new(PIXEL, "//");

        assert!(stage.add_function_definition("mx_add_float"));
        assert!(!stage.add_function_definition("mx_add_float"));
        assert!(stage.has_function_definition("mx_add_float"));
    }
}
