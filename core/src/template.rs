use std::{borrow::Borrow, collections::HashMap, ffi::OsStr, fmt, hash::Hash, str::FromStr};

use serde::{
    de::{self, Visitor},
    Deserialize, Serialize,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Undefined variable '{{{0}}}' in command template")]
    UndefinedVar(String),

    #[error("Unknown variable '{{{var}}}' (available: {})", .known.join(", "))]
    UnknownVar { var: String, known: Vec<String> },

    #[error("Unclosed brace (found open brace at {})", .0+1)]
    UnclosedBrace(usize),

    #[error("Unmatched closing brace at {}", .0+1)]
    UnmatchedCloseBrace(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Var(String),
}

/// A shell command line with `{var}` placeholders. `{{` and `}}` stand for literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl CommandTemplate {
    pub fn parse(s: &str) -> Result<Self, TemplateError> {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum State {
            Normal,
            OpenBrace,
            CloseBrace,
            InsideBrace,
        }
        use State::*;

        let mut state = Normal;
        let mut pos_open_brace = 0;
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut var_name = String::new();

        for (i, c) in s.chars().enumerate() {
            match (c, state) {
                ('{', Normal) => {
                    state = OpenBrace;
                    pos_open_brace = i;
                }
                ('{', OpenBrace) => {
                    state = Normal;
                    text.push('{');
                }
                ('}', OpenBrace) => return Err(TemplateError::UnclosedBrace(pos_open_brace)),
                (_, OpenBrace) => {
                    state = InsideBrace;
                    var_name.clear();
                    var_name.push(c);
                }
                ('}', InsideBrace) => {
                    state = Normal;
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Var(var_name.trim().to_owned()));
                }
                ('{', InsideBrace) => return Err(TemplateError::UnclosedBrace(pos_open_brace)),
                (_, InsideBrace) => var_name.push(c),
                ('}', Normal) => state = CloseBrace,
                ('}', CloseBrace) => {
                    state = Normal;
                    text.push('}');
                }
                (_, CloseBrace) => return Err(TemplateError::UnmatchedCloseBrace(i - 1)),
                (_, Normal) => text.push(c),
            }
        }

        match state {
            OpenBrace | InsideBrace => return Err(TemplateError::UnclosedBrace(pos_open_brace)),
            CloseBrace => {
                return Err(TemplateError::UnmatchedCloseBrace(s.chars().count() - 1));
            }
            Normal => (),
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self {
            source: s.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn vars(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Var(v) => Some(v.as_str()),
            Segment::Text(_) => None,
        })
    }

    /// Fails on the first placeholder that is not in `known`.
    pub fn ensure_known_vars(&self, known: &[&str]) -> Result<(), TemplateError> {
        match self.vars().find(|v| !known.contains(v)) {
            Some(var) => Err(TemplateError::UnknownVar {
                var: var.to_owned(),
                known: known.iter().map(|s| s.to_string()).collect(),
            }),
            None => Ok(()),
        }
    }

    pub fn render<K, V>(&self, variables: &HashMap<K, V>) -> Result<String, TemplateError>
    where
        K: Borrow<str> + Hash + Eq,
        V: AsRef<OsStr>,
    {
        let mut res = String::with_capacity(self.source.len() * 3);
        for seg in &self.segments {
            match seg {
                Segment::Text(s) => res += s,
                Segment::Var(name) => {
                    let Some(value) = variables.get(name.as_str()) else {
                        return Err(TemplateError::UndefinedVar(name.to_owned()));
                    };
                    res += value.as_ref().to_string_lossy().as_ref();
                }
            }
        }
        Ok(res)
    }
}

/// Quotes `value` for a POSIX shell word. Values made only of safe characters are left as is.
pub fn shell_quote(value: impl AsRef<OsStr>) -> String {
    let s = value.as_ref().to_string_lossy();
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c);
    if !s.is_empty() && s.chars().all(is_safe) {
        return s.into_owned();
    }
    format!("'{}'", s.replace('\'', r#"'\''"#))
}

impl FromStr for CommandTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for CommandTemplate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for CommandTemplate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct CommandTemplateVisitor;

        impl<'de> Visitor<'de> for CommandTemplateVisitor {
            type Value = CommandTemplate;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a command template string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Self::Value::parse(v).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(CommandTemplateVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn vars() -> HashMap<&'static str, &'static str> {
        let mut m = HashMap::new();
        m.insert("compiler", "./tmp/compiler");
        m.insert("args", "-O2");
        m.insert("source", "tests/fib.sy");
        m.insert("output", "build/fib-00c0ffee.s");
        m
    }

    fn render(s: &str) -> Result<String, TemplateError> {
        CommandTemplate::parse(s)?.render(&vars())
    }

    #[test]
    fn render_ok() {
        assert_eq!(render("hello").unwrap(), "hello");
        assert_eq!(render("").unwrap(), "");
        assert_eq!(
            render("exec {compiler} {args} {source} -o {output}").unwrap(),
            "exec ./tmp/compiler -O2 tests/fib.sy -o build/fib-00c0ffee.s"
        );
        assert_eq!(render("{args}{args}").unwrap(), "-O2-O2");
        assert_eq!(render("{ args }").unwrap(), "-O2");
        assert_eq!(render("awk '{{print $1}}'").unwrap(), "awk '{print $1}'");
        assert_eq!(render("{{args}}").unwrap(), "{args}");
    }

    #[test]
    fn render_ng() {
        assert_eq!(
            render("{compiler} {target}").unwrap_err(),
            TemplateError::UndefinedVar("target".to_owned())
        );
        assert_eq!(
            render("{args} {source").unwrap_err(),
            TemplateError::UnclosedBrace(7)
        );
        assert_eq!(render("{}").unwrap_err(), TemplateError::UnclosedBrace(0));
        assert_eq!(render("a } b").unwrap_err(), TemplateError::UnmatchedCloseBrace(2));
        assert_eq!(render("a }").unwrap_err(), TemplateError::UnmatchedCloseBrace(2));
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("build/fib-00c0ffee.s"), "build/fib-00c0ffee.s");
        assert_eq!(shell_quote("my suite/a.sy"), "'my suite/a.sy'");
        assert_eq!(shell_quote("it's;rm"), r#"'it'\''s;rm'"#);
        assert_eq!(shell_quote(""), "''");

        let mut vars = HashMap::new();
        vars.insert("source", shell_quote("dir with space/$x.sy"));
        let tmpl = CommandTemplate::parse("cat {source}").unwrap();
        assert_eq!(tmpl.render(&vars).unwrap(), "cat 'dir with space/$x.sy'");
    }

    #[test]
    fn known_vars_are_checked() {
        let tmpl = CommandTemplate::parse("exec {cc} {target} {input} -o {output}").unwrap();
        assert_eq!(tmpl.vars().collect::<Vec<_>>(), ["cc", "target", "input", "output"]);
        tmpl.ensure_known_vars(&["cc", "target", "input", "runtime", "output"])
            .unwrap();

        let err = tmpl.ensure_known_vars(&["cc", "input", "output"]).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownVar { ref var, .. } if var == "target"));
    }

    #[test]
    fn deserialize_from_toml() {
        #[derive(Debug, Deserialize)]
        struct T {
            cmd: CommandTemplate,
        }

        let t: T = toml::from_str(r#"cmd = "exec {rival} -S {source}""#).unwrap();
        assert_eq!(t.cmd.as_str(), "exec {rival} -S {source}");
        assert!(toml::from_str::<T>(r#"cmd = "exec {rival""#).is_err());
    }
}
