/// Escapes text for insertion into HTML content or a quoted attribute.
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(ch),
        }
    }
    result
}

/// Minimal streaming HTML writer. Elements are closed in reverse opening
/// order; attributes may only follow `open` directly.
#[derive(Default)]
pub struct HtmlBuilder {
    out: String,
    open_tags: Vec<&'static str>,
    start_tag_pending: bool,
}

impl HtmlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, tag: &'static str) -> &mut Self {
        self.finish_start_tag();
        self.out.push('<');
        self.out.push_str(tag);
        self.open_tags.push(tag);
        self.start_tag_pending = true;
        self
    }

    /// Starts a void element such as `meta`; it takes attributes but is never
    /// closed.
    pub fn void(&mut self, tag: &'static str) -> &mut Self {
        self.finish_start_tag();
        self.out.push('<');
        self.out.push_str(tag);
        self.start_tag_pending = true;
        self
    }

    pub fn attribute(&mut self, name: &str, value: &str) -> &mut Self {
        debug_assert!(self.start_tag_pending, "attribute outside of a start tag");
        if self.start_tag_pending {
            self.out.push(' ');
            self.out.push_str(name);
            self.out.push_str("=\"");
            self.out.push_str(&escape_html(value));
            self.out.push('"');
        }
        self
    }

    /// Raw markup, inserted as-is.
    pub fn text(&mut self, raw: &str) -> &mut Self {
        self.finish_start_tag();
        self.out.push_str(raw);
        self
    }

    pub fn escaped_text(&mut self, text: &str) -> &mut Self {
        self.finish_start_tag();
        self.out.push_str(&escape_html(text));
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.finish_start_tag();
        if let Some(tag) = self.open_tags.pop() {
            self.out.push_str("</");
            self.out.push_str(tag);
            self.out.push('>');
        }
        self
    }

    /// Closes anything still open and returns the document.
    pub fn finish(mut self) -> String {
        while !self.open_tags.is_empty() {
            self.close();
        }
        self.finish_start_tag();
        self.out
    }

    fn finish_start_tag(&mut self) {
        if self.start_tag_pending {
            self.out.push('>');
            self.start_tag_pending = false;
        }
    }
}
