// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Crawler actions

use serde::{Deserialize, Serialize};

use super::element::{HtmlElement, HtmlForm};

/// Primitive the browser executes for a navigation
///
/// Discriminants are part of navigation identity and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActionType {
    LoadUrl = 1,
    ExecuteJs = 2,
    LeftClick = 3,
    RightClick = 4,
    DoubleClick = 5,
    MouseOverAndOut = 6,
    MouseWheel = 7,
    Hover = 8,
    Focus = 9,
    Blur = 10,
    Scroll = 11,
    SendKeys = 12,
    FillForm = 13,
    Wait = 14,
    SubRequest = 15,
    Redirect = 16,
}

impl ActionType {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Action for an attached DOM event listener type
    pub fn from_event(event: &str) -> Option<Self> {
        match event {
            "focus" | "focusin" => Some(ActionType::Focus),
            "blur" | "focusout" => Some(ActionType::Blur),
            "click" | "auxclick" | "mousedown" | "mouseup" => Some(ActionType::LeftClick),
            "dblclick" => Some(ActionType::DoubleClick),
            "mouseover" | "mouseenter" | "mouseleave" | "mouseout" => {
                Some(ActionType::MouseOverAndOut)
            }
            "keydown" | "keypress" | "keyup" => Some(ActionType::SendKeys),
            "wheel" => Some(ActionType::MouseWheel),
            "contextmenu" => Some(ActionType::RightClick),
            _ => None,
        }
    }

    /// Whether this action needs a target element
    pub fn needs_element(&self) -> bool {
        !matches!(
            self,
            ActionType::LoadUrl
                | ActionType::ExecuteJs
                | ActionType::Wait
                | ActionType::FillForm
                | ActionType::SubRequest
                | ActionType::Redirect
        )
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// An action and its inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionType,
    /// Action bytes: a URL, a script, keys, or the target's hash
    #[serde(with = "bytes_b64")]
    pub input: Vec<u8>,
    pub element: Option<HtmlElement>,
    pub form: Option<HtmlForm>,
    /// Filled in after execution (e.g. script return value)
    #[serde(default, with = "opt_bytes_b64")]
    pub result: Option<Vec<u8>>,
}

impl Action {
    fn new(kind: ActionType, input: Vec<u8>) -> Self {
        Self {
            kind,
            input,
            element: None,
            form: None,
            result: None,
        }
    }

    pub fn load_url(url: &str) -> Self {
        Self::new(ActionType::LoadUrl, url.as_bytes().to_vec())
    }

    pub fn execute_js(script: &str) -> Self {
        Self::new(ActionType::ExecuteJs, script.as_bytes().to_vec())
    }

    pub fn wait(ms: u64) -> Self {
        Self::new(ActionType::Wait, ms.to_string().into_bytes())
    }

    pub fn send_keys(element: HtmlElement, keys: &str) -> Self {
        let mut action = Self::new(ActionType::SendKeys, keys.as_bytes().to_vec());
        action.element = Some(element);
        action
    }

    /// Element action; input is the element hash
    pub fn with_element(kind: ActionType, element: HtmlElement) -> Self {
        let mut action = Self::new(kind, element.hash().as_bytes().to_vec());
        action.element = Some(element);
        action
    }

    /// Form fill; input is the form hash
    pub fn fill_form(form: HtmlForm) -> Self {
        let mut action = Self::new(ActionType::FillForm, form.hash().as_bytes().to_vec());
        action.form = Some(form);
        action
    }

    /// Input as text, for URLs and scripts
    pub fn input_str(&self) -> String {
        String::from_utf8_lossy(&self.input).to_string()
    }
}

mod bytes_b64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}

mod opt_bytes_b64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => {
                s.serialize_some(&base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(d)?;
        match s {
            Some(s) => base64::engine::general_purpose::STANDARD
                .decode(s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
