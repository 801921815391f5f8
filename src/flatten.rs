// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of gelf-tracing.
//
// gelf-tracing is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// gelf-tracing is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with gelf-tracing.  If
// not, see <http://www.gnu.org/licenses/>.

//! Flattening property trees into GELF additional fields.
//!
//! GELF is flat: an additional field is an underscore-prefixed name bound to a string or a number,
//! never to a JSON object or array. [`PropertyFlattener`] walks a [`PropertyValue`] and produces
//! one `(name, value)` pair per leaf:
//!
//! - a scalar named `Host` becomes `_Host`;
//! - a structure `Request { UserId: 5 }` becomes `_Request.UserId = 5`;
//! - a sequence is rendered to a single string, `[1, 2, 3]`.
//!
//! `_id` is reserved by Graylog, so a property called `id` is sent as `_id_`.

use crate::{
    naming::PropertyNamingStrategy,
    record::{PropertyValue, Scalar},
};

use serde_json::{Number, Value};

/// Separates the path components of a nested property name.
pub const PATH_SEPARATOR: char = '.';

const RESERVED_FIELD: &str = "_id";

/// Turns [`PropertyValue`] trees into flat GELF fields, using a [`PropertyNamingStrategy`] to
/// transform each raw property name.
pub struct PropertyFlattener<'a> {
    naming: &'a dyn PropertyNamingStrategy,
}

impl<'a> PropertyFlattener<'a> {
    pub fn new(naming: &'a dyn PropertyNamingStrategy) -> PropertyFlattener<'a> {
        PropertyFlattener { naming }
    }

    /// Flatten the property `name` with value `value`, found under `prefix` (the empty string at
    /// the top level; otherwise the dotted path to the enclosing structure, separator included).
    pub fn flatten(&self, name: &str, value: &PropertyValue, prefix: &str) -> Vec<(String, Value)> {
        let mut fields = Vec::new();
        self.flatten_into(name, value, prefix, &mut fields);
        fields
    }

    fn flatten_into(
        &self,
        name: &str,
        value: &PropertyValue,
        prefix: &str,
        fields: &mut Vec<(String, Value)>,
    ) {
        let path = format!("{}{}", prefix, self.naming.property_name(name));
        match value {
            PropertyValue::Scalar(scalar) => fields.push((field_name(path), scalar_to_json(scalar))),
            PropertyValue::Sequence(_) => fields.push((
                field_name(path),
                Value::String(value.to_string().trim_matches('"').to_owned()),
            )),
            PropertyValue::Structure { members, .. } => {
                let prefix = format!("{}{}", path, PATH_SEPARATOR);
                for (member, value) in members {
                    self.flatten_into(member, value, &prefix, fields);
                }
            }
        }
    }
}

/// Turn a property path into a legal GELF additional field name.
pub fn field_name(path: String) -> String {
    let name = if path.starts_with('_') {
        path
    } else {
        format!("_{}", path)
    };
    if name.eq_ignore_ascii_case(RESERVED_FIELD) {
        format!("{}_", RESERVED_FIELD)
    } else {
        name
    }
}

/// Numbers go out as themselves & timestamps as RFC 3339 text (JSON has no date type); everything
/// else as its textual representation so that a given field keeps one type in Graylog.
pub fn scalar_to_json(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Null => Value::Null,
        Scalar::I64(n) => Value::from(*n),
        Scalar::U64(n) => Value::from(*n),
        // JSON has no NaN or infinities
        Scalar::F64(x) => Number::from_f64(*x)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(x.to_string())),
        other => Value::String(other.to_string()),
    }
}
