//! Source templates: plain code with `{{input}}` slots and `$token` substitutions.

use std::collections::HashMap;

use pest::Parser;
use pest_derive::Parser;

use crate::{Error, Result};

#[derive(Parser)]
#[grammar = "lib/pest/template.pest"]
struct TemplateParser;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Piece of a parsed [Template].
pub enum Segment {
    /// Verbatim text.
    Text(String),
    /// `{{name}}`, replaced by the value of a node input.
    Slot(String),
    /// `$name`, replaced by a backend substitution.
    Token(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Parsed source template.
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `source`; `name` identifies the template in errors.
    pub fn parse(name: &str, source: &str) -> Result<Self> {
        let error = |message: String| Error::Template {
            name: name.to_owned(),
            message,
        };

        let template = TemplateParser::parse(Rule::template, source)
            .map_err(|err| error(err.to_string()))?
            .next()
            .ok_or_else(|| error("empty template".to_owned()))?;

        let segments = template
            .into_inner()
            .filter_map(|pair| match pair.as_rule() {
                Rule::slot => pair
                    .into_inner()
                    .next()
                    .map(|identifier| Segment::Slot(identifier.as_str().to_owned())),
                Rule::token => pair
                    .into_inner()
                    .next()
                    .map(|identifier| Segment::Token(identifier.as_str().to_owned())),
                Rule::text => Some(Segment::Text(pair.as_str().to_owned())),
                _ => None,
            })
            .collect();

        Ok(Self {
            name: name.to_owned(),
            segments,
        })
    }

    #[allow(missing_docs)]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Slot names, in order of appearance.
    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Slot(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Substitute slots and tokens.
    ///
    /// Every slot must have a value; unknown tokens are kept verbatim.
    pub fn render(
        &self,
        slots: &HashMap<String, String>,
        tokens: &HashMap<String, String>,
    ) -> Result<String> {
        let mut result = String::new();

        for segment in self.segments.iter() {
            match segment {
                Segment::Text(text) => result.push_str(text),
                Segment::Slot(name) => {
                    let value = slots.get(name).ok_or_else(|| Error::Template {
                        name: self.name.clone(),
                        message: format!("nothing to substitute for `{{{{{name}}}}}`"),
                    })?;
                    result.push_str(value);
                }
                Segment::Token(name) => match tokens.get(name) {
                    Some(value) => result.push_str(value),
                    None => {
                        result.push('$');
                        result.push_str(name);
                    }
                },
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use map_macro::hash_map;

    #[test]
    fn parse_segments() {
        let template = Template::parse("IM_mix", "mix({{bg}}, {{ fg }}, $weight)").unwrap();

        assert_eq!(
            template.segments(),
            &[
                Segment::Text("mix(".to_owned()),
                Segment::Slot("bg".to_owned()),
                Segment::Text(", ".to_owned()),
                Segment::Slot("fg".to_owned()),
                Segment::Text(", ".to_owned()),
                Segment::Token("weight".to_owned()),
                Segment::Text(")".to_owned()),
            ]
        );
        assert_eq!(template.slots().collect::<Vec<_>>(), vec!["bg", "fg"]);
    }

    #[test]
    fn lone_dollar_is_text() {
        let template = Template::parse("IM_price", "a $ b").unwrap();
        assert_eq!(template.segments(), &[Segment::Text("a $ b".to_owned())]);
    }

    #[test]
    fn unterminated_slot() {
        assert!(matches!(
            Template::parse("IM_broken", "{{in1 + 1.0"),
            Err(Error::Template { .. })
        ));
    }

    #[test]
    fn render() {
        let template = Template::parse("IM_scale", "{{in1}} * $scale + $unknown").unwrap();
        let slots = hash_map! { "in1".to_owned() => "base_out".to_owned() };
        let tokens = hash_map! { "scale".to_owned() => "2.0".to_owned() };

        assert_eq!(
            template.render(&slots, &tokens).unwrap(),
            "base_out * 2.0 + $unknown"
        );
        assert!(template.render(&HashMap::new(), &tokens).is_err());
    }
}
