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

//! Property naming strategies.
//!
//! Before a property name becomes (part of) a GELF field name it is passed through a
//! [`PropertyNamingStrategy`]. The default, [`NoOpPropertyNamingStrategy`], leaves names alone.

/// Transform a raw property name. Applied once per property, at every nesting depth.
pub trait PropertyNamingStrategy: Send + Sync {
    fn property_name(&self, name: &str) -> String;
}

/// Leave property names untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpPropertyNamingStrategy;

impl PropertyNamingStrategy for NoOpPropertyNamingStrategy {
    fn property_name(&self, name: &str) -> String {
        name.to_owned()
    }
}

/// `UserId` → `userId`; `HTTPStatus` → `httpStatus`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CamelCasePropertyNamingStrategy;

impl PropertyNamingStrategy for CamelCasePropertyNamingStrategy {
    fn property_name(&self, name: &str) -> String {
        // Lower-case the leading run of capitals, leaving the last one alone if it starts the
        // next word.
        let chars: Vec<char> = name.chars().collect();
        let mut out = String::with_capacity(name.len());
        let mut i = 0;
        while i < chars.len() && chars[i].is_uppercase() {
            let next_is_lower = chars.get(i + 1).map(|c| c.is_lowercase()).unwrap_or(false);
            if i > 0 && next_is_lower {
                break;
            }
            out.extend(chars[i].to_lowercase());
            i += 1;
        }
        out.extend(&chars[i..]);
        out
    }
}

/// `UserId` → `user_id`; `HTTPStatus` → `http_status`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SnakeCasePropertyNamingStrategy;

impl PropertyNamingStrategy for SnakeCasePropertyNamingStrategy {
    fn property_name(&self, name: &str) -> String {
        let chars: Vec<char> = name.chars().collect();
        let mut out = String::with_capacity(name.len() + 4);
        for (i, c) in chars.iter().enumerate() {
            if c.is_uppercase() {
                let prev = if i > 0 { chars.get(i - 1) } else { None };
                let next = chars.get(i + 1);
                let boundary = match prev {
                    Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                    Some(p) if p.is_uppercase() => next.map(|n| n.is_lowercase()).unwrap_or(false),
                    _ => false,
                };
                if boundary && !out.ends_with('_') {
                    out.push('_');
                }
                out.extend(c.to_lowercase());
            } else {
                out.push(*c);
            }
        }
        out
    }
}

/// Any `Fn(&str) -> String` will do as a strategy.
impl<F> PropertyNamingStrategy for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn property_name(&self, name: &str) -> String {
        (self)(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case("UserId", "userId")]
    #[case("userId", "userId")]
    #[case("HTTPStatus", "httpStatus")]
    #[case("ID", "id")]
    #[case("", "")]
    fn camel_case(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(CamelCasePropertyNamingStrategy.property_name(name), expected);
    }

    #[rstest]
    #[case("UserId", "user_id")]
    #[case("HTTPStatus", "http_status")]
    #[case("already_snake", "already_snake")]
    #[case("Request2Id", "request2_id")]
    fn snake_case(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(SnakeCasePropertyNamingStrategy.property_name(name), expected);
    }

    #[test]
    fn closures() {
        let upper = |s: &str| s.to_uppercase();
        assert_eq!(upper.property_name("host"), "HOST");
        assert_eq!(NoOpPropertyNamingStrategy.property_name("Host"), "Host");
    }
}
