// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Settable node properties and style keys
//!
//! Guests name properties with strings; only names from a closed set are
//! accepted so a guest cannot write arbitrary fields on host objects.

use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Property that a guest may set on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Property {
    Id,
    ClassName,
    Title,
    Value,
    Href,
    Src,
    Alt,
    Placeholder,
    Type,
    Name,
    Checked,
    Disabled,
    Hidden,
    HtmlFor,
    Lang,
    Dir,
    TabIndex,
    Rel,
    Target,
    TextContent,
}

impl Property {
    /// Every accepted property, in declaration order
    pub const ALL: [Property; 20] = [
        Property::Id,
        Property::ClassName,
        Property::Title,
        Property::Value,
        Property::Href,
        Property::Src,
        Property::Alt,
        Property::Placeholder,
        Property::Type,
        Property::Name,
        Property::Checked,
        Property::Disabled,
        Property::Hidden,
        Property::HtmlFor,
        Property::Lang,
        Property::Dir,
        Property::TabIndex,
        Property::Rel,
        Property::Target,
        Property::TextContent,
    ];

    /// Script-side property name
    pub fn as_str(&self) -> &'static str {
        match self {
            Property::Id => "id",
            Property::ClassName => "className",
            Property::Title => "title",
            Property::Value => "value",
            Property::Href => "href",
            Property::Src => "src",
            Property::Alt => "alt",
            Property::Placeholder => "placeholder",
            Property::Type => "type",
            Property::Name => "name",
            Property::Checked => "checked",
            Property::Disabled => "disabled",
            Property::Hidden => "hidden",
            Property::HtmlFor => "htmlFor",
            Property::Lang => "lang",
            Property::Dir => "dir",
            Property::TabIndex => "tabIndex",
            Property::Rel => "rel",
            Property::Target => "target",
            Property::TextContent => "textContent",
        }
    }

    /// Name of the markup attribute this property reflects, if any
    pub fn attribute_name(&self) -> Option<&'static str> {
        match self {
            Property::ClassName => Some("class"),
            Property::HtmlFor => Some("for"),
            Property::TabIndex => Some("tabindex"),
            Property::TextContent => None,
            other => Some(other.as_str()),
        }
    }

    /// Boolean properties are rendered as bare attributes
    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            Property::Checked | Property::Disabled | Property::Hidden
        )
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Property {
    type Err = BridgeError;

    fn from_str(s: &str) -> BridgeResult<Self> {
        match s {
            "class" => return Ok(Property::ClassName),
            "for" => return Ok(Property::HtmlFor),
            _ => {}
        }
        Property::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| BridgeError::UnknownProperty(s.to_string()))
    }
}

/// Validated CSS property name, stored in kebab-case
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleKey(String);

impl StyleKey {
    /// Validate `key` and normalise camelCase to kebab-case.
    ///
    /// Accepts `backgroundColor`, `background-color` and custom properties
    /// such as `--accent`.
    pub fn parse(key: &str) -> BridgeResult<Self> {
        let invalid = || BridgeError::InvalidStyleKey(key.to_string());

        let first = key.chars().next().ok_or_else(invalid)?;
        if first.is_ascii_digit() {
            return Err(invalid());
        }
        if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid());
        }
        if key.chars().all(|c| c == '-') {
            return Err(invalid());
        }

        // Custom properties are case sensitive and kept verbatim.
        if key.starts_with("--") {
            return Ok(StyleKey(key.to_string()));
        }

        let mut out = String::with_capacity(key.len() + 4);
        for c in key.chars() {
            if c.is_ascii_uppercase() {
                out.push('-');
                out.push(c.to_ascii_lowercase());
            } else {
                out.push(c);
            }
        }
        Ok(StyleKey(out))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StyleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
