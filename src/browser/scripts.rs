// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Page-side scripts
//!
//! Functions are passed to `Runtime.callFunctionOn` with `this` bound to a
//! resolved node; expressions go to `Runtime.evaluate`.

use serde_json::Value;

/// Name of the isolated world used for injected requests
pub const ISOLATED_WORLD: &str = "browserk";

/// Header carrying the injection marker; stripped before the request leaves
pub const MARKER_HEADER: &str = "x-browserk-req";

/// Tag, attributes, own text and rendered visibility of `this`
pub const ELEMENT_INFO: &str = r#"function() {
    const attributes = {};
    for (const a of this.attributes || []) { attributes[a.name] = a.value; }
    let text = '';
    for (const n of this.childNodes || []) {
        if (n.nodeType === 3) { text += n.textContent; }
    }
    let hidden = false;
    try {
        const style = window.getComputedStyle(this);
        hidden = style.display === 'none' || style.visibility === 'hidden' ||
            (this.offsetParent === null && style.position !== 'fixed' &&
             this.tagName !== 'BODY' && this.tagName !== 'HTML');
    } catch (e) {}
    return { tag: (this.tagName || '').toLowerCase(), attributes, text: text.trim().slice(0, 256), hidden };
}"#;

/// Form attributes plus a snapshot of every field and the submit control
pub const FORM_INFO: &str = r#"function() {
    const info = (el) => {
        const attributes = {};
        for (const a of el.attributes || []) { attributes[a.name] = a.value; }
        return { tag: el.tagName.toLowerCase(), attributes, text: (el.textContent || '').trim().slice(0, 256), hidden: false };
    };
    const form = info(this);
    const fields = [];
    for (const el of this.querySelectorAll('input, select, textarea')) {
        const f = info(el);
        if (el.tagName === 'SELECT') {
            f.options = Array.from(el.options).map(o => o.value);
        }
        fields.push(f);
    }
    const submit = this.querySelector('button[type=submit], input[type=submit], button:not([type])');
    let hidden = false;
    try { hidden = window.getComputedStyle(this).display === 'none'; } catch (e) {}
    return { attributes: form.attributes, fields, submit: submit ? info(submit) : null, hidden };
}"#;

/// Fill fields of `this` from a name to value map, then submit
pub const FILL_FORM: &str = r#"function(values) {
    const fire = (el, type) => el.dispatchEvent(new Event(type, { bubbles: true }));
    for (const el of this.querySelectorAll('input, select, textarea')) {
        const key = el.name || el.id;
        if (!key || !(key in values)) { continue; }
        const type = (el.type || '').toLowerCase();
        if (type === 'checkbox' || type === 'radio') {
            el.checked = true;
        } else if (el.tagName === 'SELECT') {
            const opt = Array.from(el.options).find(o => o.value !== '');
            if (opt) { el.value = opt.value; }
        } else if (type !== 'hidden' && type !== 'submit' && type !== 'file') {
            el.focus();
            el.value = values[key];
        }
        fire(el, 'input');
        fire(el, 'change');
    }
    const submit = this.querySelector('button[type=submit], input[type=submit], button:not([type])');
    if (typeof this.requestSubmit === 'function') {
        this.requestSubmit(submit || undefined);
    } else if (submit) {
        submit.click();
    } else {
        this.submit();
    }
    return true;
}"#;

pub const CLICK: &str = "function() { this.click(); }";
pub const BLUR: &str = "function() { this.blur(); }";
pub const SCROLL_PAGE: &str = "window.scrollBy(0, window.innerHeight)";
pub const BASE_URI: &str = "document.baseURI";
pub const LOCATION: &str = "location.href";

/// Expression issuing `fetch` with the injection marker header
///
/// Every value is embedded as a JSON literal.
pub fn fetch_expression(
    method: &str,
    url: &str,
    headers: &[(String, String)],
    body: Option<&str>,
    marker: &str,
) -> String {
    let mut header_map = serde_json::Map::new();
    for (name, value) in headers {
        let lower = name.to_ascii_lowercase();
        // the browser owns these
        if matches!(
            lower.as_str(),
            "host" | "content-length" | "connection" | "cookie" | "origin" | "referer"
        ) || lower.starts_with("sec-")
        {
            continue;
        }
        header_map.insert(name.clone(), Value::String(value.clone()));
    }
    header_map.insert(MARKER_HEADER.to_string(), Value::String(marker.to_string()));

    let mut init = serde_json::Map::new();
    init.insert("method".into(), Value::String(method.to_string()));
    init.insert("headers".into(), Value::Object(header_map));
    init.insert("credentials".into(), Value::String("include".into()));
    init.insert("redirect".into(), Value::String("manual".into()));
    if let Some(body) = body {
        if method != "GET" && method != "HEAD" {
            init.insert("body".into(), Value::String(body.to_string()));
        }
    }

    format!(
        "fetch({}, {}).then(r => r.status).catch(e => String(e))",
        Value::String(url.to_string()),
        Value::Object(init)
    )
}
