//! Injected observer script
//!
//! JavaScript rendition of `FieldObserver` for hosts that can only evaluate
//! scripts in the page. The observer lives on a non-enumerable window
//! property so presence checks, value writes and teardown can reach it.
//! All runtime arguments are embedded as JSON literals.

use std::time::Duration;

use crate::config::{BridgeConfig, MIN_URL_POLL_INTERVAL_MS};

/// Bumped whenever the injected observer changes behavior
pub const OBSERVER_VERSION: u32 = 1;

const OBSERVER_KEY: &str = "__formfillObserver";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSettings {
    /// Host object name the observer posts messages through
    pub channel: String,
    pub url_poll_interval: Duration,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self::from(&BridgeConfig::default())
    }
}

impl From<&BridgeConfig> for ScriptSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            channel: config.channel.clone(),
            url_poll_interval: config.url_poll_interval(),
        }
    }
}

/// Encode a string as a JavaScript string literal
fn js_string(value: &str) -> String {
    // JSON strings are valid JS literals; escape the two line terminators
    // JSON allows raw but older engines reject
    serde_json::Value::String(value.to_string())
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

const OBSERVER_TEMPLATE: &str = r#"(function () {
  'use strict';
  var KEY = __KEY__;
  var CHANNEL = __CHANNEL__;
  var VERSION = __VERSION__;
  var POLL_MS = __POLL_MS__;
  var TEXT_TYPES = ['text', 'email', 'search', 'tel', 'url', 'number'];

  var previous = window[KEY];
  if (previous && previous.version === VERSION && previous.document === document) {
    previous.rescan();
    return true;
  }
  if (previous && typeof previous.teardown === 'function') {
    previous.teardown();
  }

  function post(message) {
    var payload;
    try {
      payload = JSON.stringify(message);
    } catch (e) {
      return;
    }
    try {
      var handlers = window.webkit && window.webkit.messageHandlers;
      if (handlers && handlers[CHANNEL]) {
        handlers[CHANNEL].postMessage(payload);
      } else if (window[CHANNEL] && typeof window[CHANNEL].postMessage === 'function') {
        window[CHANNEL].postMessage(payload);
      } else if (window.ipc && typeof window.ipc.postMessage === 'function') {
        window.ipc.postMessage(payload);
      }
    } catch (e) {
      // Bridge unavailable; the native side detects this via the presence check
    }
  }

  function tagOf(el) {
    return String(el.localName || el.tagName || '').toLowerCase();
  }

  function inputType(el) {
    var t = (el.getAttribute('type') || '').trim().toLowerCase();
    return t === '' ? 'text' : t;
  }

  function isPassword(el) {
    return tagOf(el) === 'input' && inputType(el) === 'password';
  }

  function fieldType(el) {
    if (tagOf(el) === 'textarea') return 'textarea';
    if (tagOf(el) !== 'input') return null;
    var t = inputType(el);
    return TEXT_TYPES.indexOf(t) >= 0 ? t : null;
  }

  function fieldId(el) {
    var id = (el.getAttribute('id') || '').trim();
    if (id) return id;
    var name = (el.getAttribute('name') || '').trim();
    return name || null;
  }

  function Observer() {
    this.version = VERSION;
    this.document = document;
    this.tracked = new Map();
    this.sensitive = new WeakSet();
    this.lastUrl = location.href;
    this.mutations = null;
    this.timer = null;
    this.onSubmit = this.handleSubmit.bind(this);
  }

  Observer.prototype.live = function (el) {
    if (isPassword(el)) {
      this.sensitive.add(el);
      this.untrack(el);
      return null;
    }
    if (this.sensitive.has(el) || fieldType(el) === null) return null;
    return this.tracked.get(el) || null;
  };

  Observer.prototype.track = function (el) {
    if (isPassword(el)) {
      this.sensitive.add(el);
      return;
    }
    if (this.tracked.has(el) || this.sensitive.has(el)) return;
    var type = fieldType(el);
    var id = fieldId(el);
    if (type === null || id === null) return;

    var self = this;
    var entry = { id: id, type: type, listeners: {} };
    entry.listeners.focus = function () {
      var field = self.live(el);
      if (field) post({ type: 'inputFocused', fieldIdentifier: field.id, fieldType: field.type });
    };
    entry.listeners.blur = function () {
      var field = self.live(el);
      if (!field) return;
      if (el.value) {
        post({
          type: 'saveSubmittedValue',
          fieldIdentifier: field.id,
          value: el.value,
          fieldType: field.type
        });
      }
      post({ type: 'inputBlurred', fieldIdentifier: field.id });
    };
    entry.listeners.input = function () {
      var field = self.live(el);
      if (field) post({ type: 'inputValueChanged', fieldIdentifier: field.id, value: el.value });
    };
    Object.keys(entry.listeners).forEach(function (name) {
      el.addEventListener(name, entry.listeners[name], true);
    });
    this.tracked.set(el, entry);
  };

  Observer.prototype.untrack = function (el) {
    var entry = this.tracked.get(el);
    if (!entry) return;
    Object.keys(entry.listeners).forEach(function (name) {
      el.removeEventListener(name, entry.listeners[name], true);
    });
    this.tracked.delete(el);
  };

  Observer.prototype.scan = function (root) {
    if (!root || !root.querySelectorAll) return;
    var self = this;
    if (root.matches && root.matches('input, textarea')) self.track(root);
    root.querySelectorAll('input, textarea').forEach(function (el) {
      self.track(el);
    });
  };

  Observer.prototype.reportCount = function () {
    post({ type: 'reportFieldCount', count: this.tracked.size });
  };

  Observer.prototype.rescan = function () {
    var self = this;
    this.tracked.forEach(function (_, el) {
      if (!document.contains(el)) self.untrack(el);
    });
    this.scan(document);
    this.reportCount();
  };

  Observer.prototype.handleSubmit = function (event) {
    var form = event.target;
    if (!form || !form.querySelectorAll) return;
    var self = this;
    form.querySelectorAll('input, textarea').forEach(function (el) {
      if (isPassword(el) || self.sensitive.has(el)) return;
      var type = fieldType(el);
      var id = fieldId(el);
      if (type === null || id === null || !el.value) return;
      post({ type: 'saveSubmittedValue', fieldIdentifier: id, value: el.value, fieldType: type });
    });
  };

  Observer.prototype.pollUrl = function () {
    if (location.href === this.lastUrl) return;
    this.lastUrl = location.href;
    post({ type: 'pageUrlChanged', url: this.lastUrl });
    this.rescan();
  };

  Observer.prototype.install = function () {
    var self = this;
    document.addEventListener('submit', this.onSubmit, true);
    if (typeof MutationObserver === 'function') {
      this.mutations = new MutationObserver(function (records) {
        var before = self.tracked.size;
        records.forEach(function (record) {
          record.addedNodes.forEach(function (node) {
            if (node.nodeType === 1) self.scan(node);
          });
        });
        if (self.tracked.size !== before) self.reportCount();
      });
      this.mutations.observe(document.documentElement, { childList: true, subtree: true });
    }
    this.timer = setInterval(function () {
      try {
        self.pollUrl();
      } catch (e) {
        post({ type: 'logError', message: String(e && e.message || e) });
      }
    }, POLL_MS);
    this.scan(document);
    this.reportCount();
  };

  Observer.prototype.teardown = function () {
    var self = this;
    document.removeEventListener('submit', this.onSubmit, true);
    if (this.mutations) this.mutations.disconnect();
    if (this.timer !== null) clearInterval(this.timer);
    this.tracked.forEach(function (_, el) {
      self.untrack(el);
    });
    if (window[KEY] === this) delete window[KEY];
  };

  Observer.prototype.presence = function () {
    return { installed: true, version: this.version, fields: this.tracked.size };
  };

  Observer.prototype.setInputValue = function (id, value) {
    var target = null;
    var self = this;
    this.tracked.forEach(function (entry, el) {
      if (target === null && entry.id === id && document.contains(el) && !self.sensitive.has(el)) {
        target = el;
      }
    });
    if (target === null) return false;

    var proto = tagOf(target) === 'textarea'
      ? window.HTMLTextAreaElement.prototype
      : window.HTMLInputElement.prototype;
    var descriptor = Object.getOwnPropertyDescriptor(proto, 'value');
    if (descriptor && descriptor.set) {
      descriptor.set.call(target, value);
    } else {
      target.value = value;
    }
    target.dispatchEvent(new Event('input', { bubbles: true }));
    target.dispatchEvent(new Event('change', { bubbles: true }));
    target.dispatchEvent(new KeyboardEvent('keydown', { bubbles: true }));
    target.dispatchEvent(new KeyboardEvent('keyup', { bubbles: true }));
    return true;
  };

  try {
    var observer = new Observer();
    Object.defineProperty(window, KEY, { value: observer, configurable: true, enumerable: false });
    observer.install();
    return true;
  } catch (e) {
    post({ type: 'logError', message: String(e && e.message || e) });
    return false;
  }
})();
"#;

/// Observer installation script
pub fn observer_script(settings: &ScriptSettings) -> String {
    OBSERVER_TEMPLATE
        .replace("__KEY__", &js_string(OBSERVER_KEY))
        .replace("__CHANNEL__", &js_string(&settings.channel))
        .replace("__VERSION__", &OBSERVER_VERSION.to_string())
        .replace(
            "__POLL_MS__",
            &settings
                .url_poll_interval
                .as_millis()
                .max(MIN_URL_POLL_INTERVAL_MS as u128)
                .to_string(),
        )
}

/// Script reporting whether the observer is installed, as a JSON string
pub fn presence_check_script() -> String {
    format!(
        "(function () {{ var o = window[{key}]; \
         var absent = {{ installed: false, version: 0, fields: 0 }}; \
         return JSON.stringify(o ? o.presence() : absent); }})();",
        key = js_string(OBSERVER_KEY)
    )
}

/// Script writing `value` into the tracked field `field_identifier`
///
/// Evaluates to `true` if the field was found and written.
pub fn set_input_value_script(field_identifier: &str, value: &str) -> String {
    format!(
        "(function () {{ var o = window[{key}]; \
         return o ? o.setInputValue({field}, {value}) : false; }})();",
        key = js_string(OBSERVER_KEY),
        field = js_string(field_identifier),
        value = js_string(value),
    )
}

/// Script removing the observer and all of its listeners
pub fn teardown_script() -> String {
    format!(
        "(function () {{ var o = window[{key}]; if (o) {{ o.teardown(); }} return true; }})();",
        key = js_string(OBSERVER_KEY)
    )
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod script_tests;
