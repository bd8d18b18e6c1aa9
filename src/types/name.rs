/// A name that matches a `LIST` command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Name {
    pub(crate) attributes: Vec<NameAttribute>,
    pub(crate) delimiter: Option<String>,
    pub(crate) name: String,
}

/// An attribute set for an IMAP name.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum NameAttribute {
    /// It is not possible for any child levels of hierarchy to exist
    /// under this name; no child levels exist now and none can be
    /// created in the future.
    NoInferiors,

    /// It is not possible to use this name as a selectable mailbox.
    NoSelect,

    /// The mailbox has been marked "interesting" by the server; the
    /// mailbox probably contains messages that have been added since
    /// the last time the mailbox was selected.
    Marked,

    /// The mailbox does not contain any additional messages since the
    /// last time the mailbox was selected.
    Unmarked,

    /// A non-standard user- or server-defined name attribute.
    Custom(String),
}

impl NameAttribute {
    fn system(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "\\noinferiors" => Some(NameAttribute::NoInferiors),
            "\\noselect" => Some(NameAttribute::NoSelect),
            "\\marked" => Some(NameAttribute::Marked),
            "\\unmarked" => Some(NameAttribute::Unmarked),
            _ => None,
        }
    }
}

impl From<String> for NameAttribute {
    fn from(s: String) -> Self {
        if let Some(f) = NameAttribute::system(&s) {
            f
        } else {
            NameAttribute::Custom(s)
        }
    }
}

impl<'a> From<&'a str> for NameAttribute {
    fn from(s: &'a str) -> Self {
        if let Some(f) = NameAttribute::system(s) {
            f
        } else {
            NameAttribute::Custom(s.to_string())
        }
    }
}

impl Name {
    /// Builds a name from its parts; `name` is the decoded (UTF-8) mailbox name.
    pub fn new(
        name: impl Into<String>,
        delimiter: Option<&str>,
        attributes: Vec<NameAttribute>,
    ) -> Self {
        Name {
            attributes,
            delimiter: delimiter.map(str::to_string),
            name: name.into(),
        }
    }

    /// Attributes of this name.
    pub fn attributes(&self) -> &[NameAttribute] {
        &self.attributes[..]
    }

    /// The hierarchy delimiter is a character used to delimit levels of hierarchy in a mailbox
    /// name. `None` means that no hierarchy exists; the name is a "flat" name.
    pub fn delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref()
    }

    /// The mailbox name, decoded from modified UTF-7.
    pub fn name(&self) -> &str {
        &self.name
    }
}
