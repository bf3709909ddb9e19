//! The event vocabulary shared by every traversal.
//!
//! A [`ResponseReader`](crate::reader::ResponseReader) walking a JSON or cache
//! source and a [`ResponseWriter`](crate::writer::ResponseWriter) replaying a
//! locally built value both drive a [`ResolveDelegate`] with the same linear
//! sequence of events. For one object field the sequence is:
//!
//! ```text
//! will_resolve(field)
//!   will_resolve_object(field, raw)
//!     ... events for each selected sub-field ...
//!   did_resolve_object(field, raw)
//! did_resolve(field)
//! ```
//!
//! A list of `n` elements emits `will_resolve_element(i)` / `did_resolve_element(i)`
//! around each element's own scalar/null/object/list events, then a single
//! `did_resolve_list(n)`. Values handed to `did_resolve_scalar` are always the
//! raw wire form, custom scalars included.
//!
//! `R` is the raw object type the source exposes: a JSON object map for
//! network payloads and writer buffers.

use gql_runtime_types::{ResponseField, Variables};
use serde_json::Value;

use crate::error::Result;

/// Receiver of traversal events. Every method defaults to doing nothing.
pub trait ResolveDelegate<R> {
    fn will_resolve_root(&mut self, _root_key: &str) {}

    fn will_resolve(&mut self, _field: &ResponseField, _variables: &Variables) -> Result<()> {
        Ok(())
    }

    fn did_resolve(&mut self, _field: &ResponseField, _variables: &Variables) -> Result<()> {
        Ok(())
    }

    fn did_resolve_scalar(&mut self, _value: &Value) {}

    fn did_resolve_null(&mut self) {}

    fn will_resolve_object(&mut self, _field: &ResponseField, _object: &R) -> Result<()> {
        Ok(())
    }

    fn did_resolve_object(&mut self, _field: &ResponseField, _object: &R) -> Result<()> {
        Ok(())
    }

    fn did_resolve_list(&mut self, _len: usize) {}

    fn will_resolve_element(&mut self, _index: usize) {}

    fn did_resolve_element(&mut self, _index: usize) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpDelegate;

impl<R> ResolveDelegate<R> for NoOpDelegate {}

impl<R, D> ResolveDelegate<R> for &mut D
where
    D: ResolveDelegate<R> + ?Sized,
{
    fn will_resolve_root(&mut self, root_key: &str) {
        (**self).will_resolve_root(root_key)
    }

    fn will_resolve(&mut self, field: &ResponseField, variables: &Variables) -> Result<()> {
        (**self).will_resolve(field, variables)
    }

    fn did_resolve(&mut self, field: &ResponseField, variables: &Variables) -> Result<()> {
        (**self).did_resolve(field, variables)
    }

    fn did_resolve_scalar(&mut self, value: &Value) {
        (**self).did_resolve_scalar(value)
    }

    fn did_resolve_null(&mut self) {
        (**self).did_resolve_null()
    }

    fn will_resolve_object(&mut self, field: &ResponseField, object: &R) -> Result<()> {
        (**self).will_resolve_object(field, object)
    }

    fn did_resolve_object(&mut self, field: &ResponseField, object: &R) -> Result<()> {
        (**self).did_resolve_object(field, object)
    }

    fn did_resolve_list(&mut self, len: usize) {
        (**self).did_resolve_list(len)
    }

    fn will_resolve_element(&mut self, index: usize) {
        (**self).will_resolve_element(index)
    }

    fn did_resolve_element(&mut self, index: usize) {
        (**self).did_resolve_element(index)
    }
}

/// Fan-out: both delegates see every event, first `A` then `B`.
impl<R, A, B> ResolveDelegate<R> for (A, B)
where
    A: ResolveDelegate<R>,
    B: ResolveDelegate<R>,
{
    fn will_resolve_root(&mut self, root_key: &str) {
        self.0.will_resolve_root(root_key);
        self.1.will_resolve_root(root_key);
    }

    fn will_resolve(&mut self, field: &ResponseField, variables: &Variables) -> Result<()> {
        self.0.will_resolve(field, variables)?;
        self.1.will_resolve(field, variables)
    }

    fn did_resolve(&mut self, field: &ResponseField, variables: &Variables) -> Result<()> {
        self.0.did_resolve(field, variables)?;
        self.1.did_resolve(field, variables)
    }

    fn did_resolve_scalar(&mut self, value: &Value) {
        self.0.did_resolve_scalar(value);
        self.1.did_resolve_scalar(value);
    }

    fn did_resolve_null(&mut self) {
        self.0.did_resolve_null();
        self.1.did_resolve_null();
    }

    fn will_resolve_object(&mut self, field: &ResponseField, object: &R) -> Result<()> {
        self.0.will_resolve_object(field, object)?;
        self.1.will_resolve_object(field, object)
    }

    fn did_resolve_object(&mut self, field: &ResponseField, object: &R) -> Result<()> {
        self.0.did_resolve_object(field, object)?;
        self.1.did_resolve_object(field, object)
    }

    fn did_resolve_list(&mut self, len: usize) {
        self.0.did_resolve_list(len);
        self.1.did_resolve_list(len);
    }

    fn will_resolve_element(&mut self, index: usize) {
        self.0.will_resolve_element(index);
        self.1.will_resolve_element(index);
    }

    fn did_resolve_element(&mut self, index: usize) {
        self.0.did_resolve_element(index);
        self.1.did_resolve_element(index);
    }
}

/// Records events as strings; test support for asserting exact sequences.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct EventLog {
    pub events: Vec<String>,
}

#[cfg(test)]
impl<R> ResolveDelegate<R> for EventLog {
    fn will_resolve_root(&mut self, root_key: &str) {
        self.events.push(format!("root {}", root_key));
    }

    fn will_resolve(&mut self, field: &ResponseField, _variables: &Variables) -> Result<()> {
        self.events.push(format!("will {}", field.response_name()));
        Ok(())
    }

    fn did_resolve(&mut self, field: &ResponseField, _variables: &Variables) -> Result<()> {
        self.events.push(format!("did {}", field.response_name()));
        Ok(())
    }

    fn did_resolve_scalar(&mut self, value: &Value) {
        self.events.push(format!("scalar {}", value));
    }

    fn did_resolve_null(&mut self) {
        self.events.push("null".to_string());
    }

    fn will_resolve_object(&mut self, _field: &ResponseField, _object: &R) -> Result<()> {
        self.events.push("{".to_string());
        Ok(())
    }

    fn did_resolve_object(&mut self, _field: &ResponseField, _object: &R) -> Result<()> {
        self.events.push("}".to_string());
        Ok(())
    }

    fn did_resolve_list(&mut self, len: usize) {
        self.events.push(format!("list {}", len));
    }

    fn will_resolve_element(&mut self, index: usize) {
        self.events.push(format!("[{}", index));
    }

    fn did_resolve_element(&mut self, index: usize) {
        self.events.push(format!("{}]", index));
    }
}
