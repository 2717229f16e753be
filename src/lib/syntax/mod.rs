//! Per-language formatting rules: type names, literals, declarations and identifiers.
//!
//! A [Syntax] is pure data plus mapping functions; several targets may share the syntax of
//! their language.

pub mod glsl;
pub mod osl;

use std::collections::{HashMap, HashSet};

use crate::{
    types::{BaseType, TypeDesc},
    util,
    value::Value,
};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
/// [Syntax] error
pub enum Error {
    #[error("Type `{ty}` is not supported by {language}")]
    /// No syntax registered for the type.
    UnsupportedType {
        #[allow(missing_docs)]
        ty: String,
        #[allow(missing_docs)]
        language: String,
    },

    #[error("Value `{value}` cannot be expressed as a `{ty}` literal in {language}")]
    /// Value of the wrong shape, or type without literals.
    UnsupportedValue {
        #[allow(missing_docs)]
        value: String,
        #[allow(missing_docs)]
        ty: String,
        #[allow(missing_docs)]
        language: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
/// How literals of a type are written.
pub enum ValueFormat {
    /// Bare scalar literal.
    Scalar,
    /// `name(a, b, c)`.
    Constructor(String),
    /// A 3x3 matrix written through a 4x4 constructor, padded with identity.
    PaddedMatrix(String),
    /// Quoted string.
    Quoted,
    /// No literal form; only the default value may be used.
    None,
}

#[derive(Clone, Debug, PartialEq)]
/// Syntax of one type in one language.
pub struct TypeSyntax {
    /// Type name in the target language.
    pub name: String,
    /// Value used to initialize variables.
    pub default_value: String,
    /// Value used to initialize uniforms, when it differs from `default_value`.
    pub uniform_default_value: Option<String>,
    #[allow(missing_docs)]
    pub format: ValueFormat,
    /// Definition to emit before the type can be used (structs).
    pub definition: Option<String>,
}

impl TypeSyntax {
    /// Scalar type written as a bare literal.
    pub fn scalar(name: &str, default_value: &str) -> Self {
        Self {
            name: name.to_owned(),
            default_value: default_value.to_owned(),
            uniform_default_value: None,
            format: ValueFormat::Scalar,
            definition: None,
        }
    }

    /// Aggregate type written through its constructor.
    pub fn aggregate(name: &str, default_value: &str) -> Self {
        Self {
            format: ValueFormat::Constructor(name.to_owned()),
            ..Self::scalar(name, default_value)
        }
    }

    /// Type without literal form.
    pub fn opaque(name: &str, default_value: &str) -> Self {
        Self {
            format: ValueFormat::None,
            ..Self::scalar(name, default_value)
        }
    }

    #[allow(missing_docs)]
    pub fn with_format(mut self, format: ValueFormat) -> Self {
        self.format = format;
        self
    }

    #[allow(missing_docs)]
    pub fn with_uniform_default(mut self, value: &str) -> Self {
        self.uniform_default_value = Some(value.to_owned());
        self
    }

    #[allow(missing_docs)]
    pub fn with_definition(mut self, definition: &str) -> Self {
        self.definition = Some(definition.to_owned());
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Storage qualifiers of a language.
pub struct Qualifiers {
    #[allow(missing_docs)]
    pub uniform: String,
    #[allow(missing_docs)]
    pub input: String,
    #[allow(missing_docs)]
    pub output: String,
    #[allow(missing_docs)]
    pub constant: String,
}

/// Names already taken in one scope.
pub type IdentifierSet = HashSet<String>;

#[derive(Clone, Debug)]
/// Formatting rules of one shading language.
pub struct Syntax {
    language: String,
    types: HashMap<String, TypeSyntax>,
    reserved: HashSet<String>,
    invalid_tokens: Vec<(String, String)>,
    qualifiers: Qualifiers,
    comment: String,
    source_extension: String,
}

impl Syntax {
    /// Empty syntax; types are added with [register_type](Self::register_type).
    pub fn new(language: &str, qualifiers: Qualifiers, source_extension: &str) -> Self {
        Self {
            language: language.to_owned(),
            types: HashMap::new(),
            reserved: HashSet::new(),
            invalid_tokens: Vec::new(),
            qualifiers,
            comment: "//".to_owned(),
            source_extension: source_extension.to_owned(),
        }
    }

    #[allow(missing_docs)]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[allow(missing_docs)]
    pub fn qualifiers(&self) -> &Qualifiers {
        &self.qualifiers
    }

    /// Single-line comment prefix.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Extension of library source files, including the dot.
    pub fn source_extension(&self) -> &str {
        &self.source_extension
    }

    /// Register (or replace) the syntax of a type, by type name.
    pub fn register_type(&mut self, type_name: &str, syntax: TypeSyntax) -> &mut Self {
        self.types.insert(type_name.to_owned(), syntax);
        self
    }

    /// Add words that may never be used as identifiers.
    pub fn register_reserved<I, S>(&mut self, words: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(words.into_iter().map(Into::into));
        self
    }

    /// Substrings to rewrite when creating identifiers (e.g. `__` in GLSL).
    pub fn register_invalid_token(&mut self, token: &str, replacement: &str) -> &mut Self {
        self.invalid_tokens
            .push((token.to_owned(), replacement.to_owned()));
        self
    }

    #[allow(missing_docs)]
    pub fn is_reserved(&self, word: &str) -> bool {
        self.reserved.contains(word)
    }

    /// Syntax of a type. Structured types without an explicit entry get a derived one.
    pub fn type_syntax(&self, ty: &TypeDesc) -> Result<TypeSyntax, Error> {
        if let Some(syntax) = self.types.get(ty.name()) {
            return Ok(syntax.clone());
        }

        if ty.basetype() == BaseType::Struct {
            return self.struct_syntax(ty);
        }

        Err(self.unsupported(ty))
    }

    fn unsupported(&self, ty: &TypeDesc) -> Error {
        Error::UnsupportedType {
            ty: ty.name().to_owned(),
            language: self.language.clone(),
        }
    }

    fn struct_syntax(&self, ty: &TypeDesc) -> Result<TypeSyntax, Error> {
        let name = self.make_valid_name(ty.name());

        let mut definition = format!("struct {name}\n{{\n");
        let mut defaults = Vec::with_capacity(ty.members().len());
        for (member, member_ty) in ty.members() {
            let member_syntax = self.type_syntax(member_ty)?;
            definition += &format!(
                "    {} {};\n",
                member_syntax.name,
                self.make_valid_name(member)
            );
            defaults.push(member_syntax.default_value);
        }
        definition += "};";

        Ok(TypeSyntax::opaque(&name, &format!("{name}({})", defaults.join(", ")))
            .with_definition(&definition))
    }

    /// Name of a type in this language.
    pub fn type_name(&self, ty: &TypeDesc) -> Result<String, Error> {
        self.type_syntax(ty).map(|syntax| syntax.name)
    }

    /// Value used when nothing is bound, for a variable or a uniform.
    pub fn default_value(&self, ty: &TypeDesc, uniform: bool) -> Result<String, Error> {
        let syntax = self.type_syntax(ty)?;
        Ok(match (uniform, syntax.uniform_default_value) {
            (true, Some(value)) => value,
            _ => syntax.default_value,
        })
    }

    /// Definition that must be emitted before the type is used, if any.
    pub fn type_definition(&self, ty: &TypeDesc) -> Result<Option<String>, Error> {
        self.type_syntax(ty).map(|syntax| syntax.definition)
    }

    /// Format a literal of `ty`.
    ///
    /// # Example
    /// ```
    /// use shadergen::{syntax::glsl, types::{names, TypeRegistry}, value::Value};
    ///
    /// let registry = TypeRegistry::initialize();
    /// let syntax = glsl::syntax();
    ///
    /// let float = registry.get(names::FLOAT).unwrap();
    /// assert_eq!(syntax.format_value(&float, &Value::Float(1.)).unwrap(), "1.0");
    ///
    /// let color3 = registry.get(names::COLOR3).unwrap();
    /// let value = Value::Floats(vec![1., 0.5, 0.]);
    /// assert_eq!(syntax.format_value(&color3, &value).unwrap(), "vec3(1.0, 0.5, 0.0)");
    /// ```
    pub fn format_value(&self, ty: &TypeDesc, value: &Value) -> Result<String, Error> {
        let syntax = self.type_syntax(ty)?;
        let unsupported = || Error::UnsupportedValue {
            value: value.to_string(),
            ty: ty.name().to_owned(),
            language: self.language.clone(),
        };

        if !value.fits(ty) {
            return Err(unsupported());
        }

        Ok(match (&syntax.format, value) {
            (ValueFormat::Scalar, Value::Boolean(b)) => self.format_bool(&syntax, *b),
            (ValueFormat::Scalar, Value::Integer(i)) => i.to_string(),
            (ValueFormat::Scalar, Value::Float(f)) => format_float(*f),
            (ValueFormat::Constructor(name), Value::Floats(floats)) => format!(
                "{name}({})",
                floats
                    .iter()
                    .map(|f| format_float(*f))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            (ValueFormat::PaddedMatrix(name), Value::Floats(floats)) if floats.len() == 9 => {
                let mut padded = Vec::with_capacity(16);
                for row in floats.chunks(3) {
                    padded.extend(row.iter().map(|f| format_float(*f)));
                    padded.push(format_float(0.));
                }
                padded.extend(["0.0", "0.0", "0.0", "1.0"].map(str::to_owned));
                format!("{name}({})", padded.join(", "))
            }
            (ValueFormat::Quoted, Value::String(s)) => format!("{s:?}"),
            _ => return Err(unsupported()),
        })
    }

    fn format_bool(&self, syntax: &TypeSyntax, value: bool) -> String {
        // Languages without booleans store them as integers.
        match (syntax.name.as_str(), value) {
            ("int", true) => "1".to_owned(),
            ("int", false) => "0".to_owned(),
            (_, value) => value.to_string(),
        }
    }

    /// `qualifier type name[size]`.
    pub fn declaration(
        &self,
        qualifier: &str,
        ty: &TypeDesc,
        name: &str,
        array_size: Option<usize>,
    ) -> Result<String, Error> {
        let type_name = self.type_name(ty)?;
        let array = array_size.map_or(String::new(), |size| format!("[{size}]"));

        Ok(if qualifier.is_empty() {
            format!("{type_name} {name}{array}")
        } else {
            format!("{qualifier} {type_name} {name}{array}")
        })
    }

    /// Check that `name` can be used verbatim as an identifier.
    pub fn is_valid_identifier(&self, name: &str) -> bool {
        util::is_valid_name(name)
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && !self.is_reserved(name)
            && !self
                .invalid_tokens
                .iter()
                .any(|(token, _)| name.contains(token.as_str()))
    }

    /// Turn any string into a legal, non-reserved identifier.
    pub fn make_valid_name(&self, name: &str) -> String {
        let mut result = util::create_valid_name(name, '_');

        for (token, replacement) in self.invalid_tokens.iter() {
            while result.contains(token.as_str()) {
                result = result.replace(token.as_str(), replacement);
            }
        }

        if result.is_empty() || result.starts_with(|c: char| c.is_ascii_digit()) {
            result.insert(0, 'v');
        }

        while self.is_reserved(&result) {
            result = util::increment_name(&result);
        }

        result
    }

    /// Create an identifier from `name`, unique within `identifiers`, and record it.
    pub fn make_identifier(&self, name: &str, identifiers: &mut IdentifierSet) -> String {
        let mut result = self.make_valid_name(name);

        while identifiers.contains(&result) || self.is_reserved(&result) {
            result = util::increment_name(&result);
        }

        identifiers.insert(result.clone());
        result
    }
}

/// Float literal that always carries a decimal point.
pub fn format_float(value: f32) -> String {
    let text = format!("{value:?}");
    if text.contains(['.', 'e', 'E']) || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{names, TypeRegistry};

    fn syntax() -> Syntax {
        let mut syntax = Syntax::new(
            "test",
            Qualifiers {
                uniform: "uniform".to_owned(),
                input: "in".to_owned(),
                output: "out".to_owned(),
                constant: "const".to_owned(),
            },
            ".test",
        );
        syntax
            .register_type(names::FLOAT, TypeSyntax::scalar("float", "0.0"))
            .register_type(names::INTEGER, TypeSyntax::scalar("int", "0"))
            .register_type(names::BOOLEAN, TypeSyntax::scalar("int", "0"))
            .register_type(names::COLOR3, TypeSyntax::aggregate("vec3", "vec3(0.0)"))
            .register_type(
                names::MATRIX33,
                TypeSyntax::aggregate("matrix", "matrix(1.0)")
                    .with_format(ValueFormat::PaddedMatrix("matrix".to_owned())),
            )
            .register_reserved(["out", "float"])
            .register_invalid_token("__", "_");
        syntax
    }

    #[test]
    fn floats_keep_a_decimal_point() {
        assert_eq!(format_float(1.), "1.0");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(-0.125), "-0.125");
    }

    #[test]
    fn literals() {
        let registry = TypeRegistry::initialize();
        let syntax = syntax();

        let boolean = registry.get(names::BOOLEAN).unwrap();
        assert_eq!(syntax.format_value(&boolean, &Value::Boolean(true)).unwrap(), "1");

        let matrix33 = registry.get(names::MATRIX33).unwrap();
        let identity = Value::Floats(vec![1., 0., 0., 0., 1., 0., 0., 0., 1.]);
        assert_eq!(
            syntax.format_value(&matrix33, &identity).unwrap(),
            "matrix(1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0)"
        );

        let float = registry.get(names::FLOAT).unwrap();
        assert!(matches!(
            syntax.format_value(&float, &Value::Integer(1)),
            Err(Error::UnsupportedValue { .. })
        ));

        let vector2 = registry.get(names::VECTOR2).unwrap();
        assert!(matches!(
            syntax.type_name(&vector2),
            Err(Error::UnsupportedType { .. })
        ));
    }

    #[test]
    fn declarations() {
        let registry = TypeRegistry::initialize();
        let syntax = syntax();
        let color3 = registry.get(names::COLOR3).unwrap();

        assert_eq!(
            syntax.declaration("uniform", &color3, "u_tint", None).unwrap(),
            "uniform vec3 u_tint"
        );
        assert_eq!(
            syntax.declaration("", &color3, "weights", Some(4)).unwrap(),
            "vec3 weights[4]"
        );
    }

    #[test]
    fn identifiers() {
        let syntax = syntax();
        let mut identifiers = IdentifierSet::new();

        assert!(!syntax.is_valid_identifier("out"));
        assert!(!syntax.is_valid_identifier("a__b"));
        assert!(!syntax.is_valid_identifier("1st"));
        assert!(syntax.is_valid_identifier("add_out"));

        assert_eq!(syntax.make_valid_name("my node__out"), "my_node_out");
        assert_eq!(syntax.make_valid_name("2d"), "v2d");
        assert_eq!(syntax.make_valid_name("out"), "out2");

        assert_eq!(syntax.make_identifier("add_out", &mut identifiers), "add_out");
        assert_eq!(syntax.make_identifier("add_out", &mut identifiers), "add_out2");
        assert_eq!(syntax.make_identifier("add out", &mut identifiers), "add_out3");
    }

    #[test]
    fn struct_types_derive_their_syntax() {
        let mut registry = TypeRegistry::initialize();
        let float = registry.get(names::FLOAT).unwrap();
        let color3 = registry.get(names::COLOR3).unwrap();
        let layer = registry
            .register_struct(
                "layer_data",
                vec![("weight".to_owned(), float), ("tint".to_owned(), color3)],
            )
            .unwrap();

        let syntax = syntax();
        assert_eq!(syntax.type_name(&layer).unwrap(), "layer_data");
        assert_eq!(
            syntax.default_value(&layer, false).unwrap(),
            "layer_data(0.0, vec3(0.0))"
        );
        assert_eq!(
            syntax.type_definition(&layer).unwrap().as_deref(),
            Some("struct layer_data\n{\n    float weight;\n    vec3 tint;\n};")
        );
    }
}
