//! Regexp and MatchData wrappers over the `regex` crate.

use crate::core::heap::{HeapObject, MatchDataObject, RegexpObject};
use crate::core::{Env, ObjectKind, Value};
use crate::errors::messages;

use super::{RtResult, Runtime};

impl Runtime {
    /// Compile a pattern. A compilation failure surfaces as a
    /// `SyntaxError` carrying the engine's message.
    pub fn regexp_new(&mut self, env: &Env, pattern: &str) -> RtResult<Value> {
        match regex::Regex::new(pattern) {
            Ok(regex) => {
                let id = self.heap.alloc(HeapObject::new(
                    self.core.regexp_class,
                    ObjectKind::Regexp(RegexpObject {
                        pattern: pattern.to_string(),
                        regex,
                    }),
                ));
                Ok(Value::object(id))
            }
            Err(e) => Err(self.raise(env, "SyntaxError", e.to_string())),
        }
    }

    /// A MatchData holding the capture spans and a copy of the subject.
    pub fn matchdata_new(&mut self, captures: &regex::Captures<'_>, subject: &str) -> Value {
        let spans = captures
            .iter()
            .map(|m| m.map(|m| (m.start(), m.end())))
            .collect();
        let id = self.heap.alloc(HeapObject::new(
            self.core.match_data_class,
            ObjectKind::MatchData(Box::new(MatchDataObject {
                spans,
                subject: subject.to_string(),
            })),
        ));
        Value::object(id)
    }

    /// Match a Regexp against a String; the result (MatchData or nil) also
    /// lands in the env's last-match slot.
    pub fn regexp_match(&mut self, env: &Env, regexp: Value, string: Value) -> RtResult<Value> {
        let compiled = match &self.heap.get(regexp.as_object_id()).kind {
            ObjectKind::Regexp(r) => r.regex.clone(),
            other => {
                let found = other.name().to_string();
                return Err(self.raise(
                    env,
                    "TypeError",
                    messages::wrong_argument_type(&found, "Regexp"),
                ));
            }
        };
        let subject = match self.string_content(string) {
            Some(s) => s.to_string(),
            None => {
                let class_name = self.class_name_of(string);
                return Err(self.raise(
                    env,
                    "TypeError",
                    messages::wrong_argument_type(&class_name, "String"),
                ));
            }
        };
        match compiled.captures(&subject) {
            Some(captures) => {
                let matchdata = self.matchdata_new(&captures, &subject);
                env.set_last_match(Some(matchdata));
                Ok(matchdata)
            }
            None => {
                env.set_last_match(None);
                Ok(self.core.nil_obj)
            }
        }
    }

    /// The env's last match, or nil when no match ran in this frame.
    pub fn last_match(&self, env: &Env) -> Value {
        env.last_match().unwrap_or(self.core.nil_obj)
    }

    /// The span of capture group `index` in a MatchData, as subject text.
    pub fn matchdata_group(&mut self, matchdata: Value, index: usize) -> Value {
        let text = match &self.heap.get(matchdata.as_object_id()).kind {
            ObjectKind::MatchData(m) => m
                .spans
                .get(index)
                .copied()
                .flatten()
                .map(|(start, end)| m.subject[start..end].to_string()),
            other => panic!("expected a MatchData, found {}", other.name()),
        };
        match text {
            Some(s) => self.string_new(&s),
            None => self.core.nil_obj,
        }
    }
}
