//! Wiki link parsing.
//!
//! A [`Link`] is created from the raw text found between `[[` and `]]` together with the
//! site it was found on. The text is only parsed when one of the resolved fields is first
//! accessed; the outcome (success or failure) is cached for the lifetime of the link.
//!
//! ```text
//! [[:wikt:de:Haus#Deutsch|Haus]]
//!   ^ leading colon
//!    ^^^^^^^ interwiki prefixes, each switching the current site
//!            ^^^^ title
//!                 ^^^^^^^ section
//!                         ^^^^ anchor
//! ```
use std::{
    fmt::{self, Display},
    sync::{LazyLock, OnceLock},
};

use compact_str::CompactString;
use regex::Regex;
use tracing::instrument;

use crate::{
    site::{Namespace, NamespaceCase, Site, SiteError},
    utils::{
        contains_replacement_char, decode_entities, decode_percent, find_colon, first_upper,
        fold_case, normalize_title_text,
    },
};

pub const MAX_TITLE_BYTES: usize = 255;

// characters that may never appear in a title, and escape sequences that should have been
// decoded already (anything left over is double encoded)
static ILLEGAL_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[\x00-\x1f\x23\x3c\x3e\x5b\x5d\x7b\x7c\x7d\x7f]|%[0-9A-Fa-f]{2}|&[A-Za-z0-9\x{80}-\x{ff}]+;|&#[0-9]+;|&#x[0-9A-Fa-f]+;",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidTitleReason {
    IllegalCharacters,
    DotCombination,
    TildeSequence,
    OverLength,
    /// A namespace prefix with nothing after it.
    NoTitle,
    /// No title and no interwiki prefix.
    Empty,
    /// The title would also be a valid title in another namespace once moved to its
    /// talk (or subject) page.
    TalkNamespaceCollision,
    NonLocalInterwiki,
    /// The namespace has no counterpart on the site a link is rendered for.
    NoCorrespondingNamespace,
}

impl Display for InvalidTitleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvalidTitleReason::IllegalCharacters => "contains illegal characters",
            InvalidTitleReason::DotCombination => "contains . / combinations",
            InvalidTitleReason::TildeSequence => "contains ~~~",
            InvalidTitleReason::OverLength => "over 255 bytes",
            InvalidTitleReason::NoTitle => "has no title",
            InvalidTitleReason::Empty => "does not contain a page title",
            InvalidTitleReason::TalkNamespaceCollision => {
                "its (non-)talk page is a valid title in another namespace"
            }
            InvalidTitleReason::NonLocalInterwiki => {
                "links to a non local site via an interwiki link"
            }
            InvalidTitleReason::NoCorrespondingNamespace => "has no corresponding namespace",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid title {text:?}: {reason}")]
pub struct InvalidTitleError {
    pub text: String,
    pub reason: InvalidTitleReason,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error(transparent)]
    InvalidTitle(#[from] InvalidTitleError),
    #[error("link {text:?} points to an unknown site")]
    UnknownSite {
        text: String,
        #[source]
        source: SiteError,
    },
}

impl LinkError {
    /// The reason of an invalid title, `None` for site errors.
    pub fn reason(&self) -> Option<InvalidTitleReason> {
        match self {
            LinkError::InvalidTitle(e) => Some(e.reason),
            LinkError::UnknownSite { .. } => None,
        }
    }
}

fn invalid(text: &str, reason: InvalidTitleReason) -> LinkError {
    LinkError::InvalidTitle(InvalidTitleError {
        text: text.to_string(),
        reason,
    })
}

/// The resolved form of a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedLink {
    site: Site,
    namespace: i32,
    title: String,
    section: Option<String>,
    is_interwiki: bool,
    leading_colon: bool,
}

impl ParsedLink {
    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn namespace(&self) -> i32 {
        self.namespace
    }

    /// The namespace on the resolved site. `None` if the link was built with a namespace
    /// id the site does not know.
    pub fn namespace_info(&self) -> Option<&Namespace> {
        self.site.namespace(self.namespace)
    }

    /// The title without namespace prefix.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }

    pub fn is_interwiki(&self) -> bool {
        self.is_interwiki
    }

    /// Whether the text started with `:` (`[[:Category:Foo]]` links to the category
    /// instead of categorising).
    pub fn leading_colon(&self) -> bool {
        self.leading_colon
    }

    fn local_ns_name(&self, onsite: &Site) -> CompactString {
        onsite
            .namespace(self.namespace)
            .or_else(|| self.namespace_info())
            .map(|ns| ns.custom_name.clone())
            .unwrap_or_else(|| CompactString::from(self.namespace.to_string()))
    }

    /// `Namespace:Title` with the local namespace name of the resolved site.
    pub fn canonical_title(&self) -> String {
        if self.namespace == Namespace::MAIN {
            self.title.clone()
        } else {
            format!("{}:{}", self.local_ns_name(&self.site), self.title)
        }
    }

    /// `Namespace:Title`, with the namespace name used on `onsite`.
    ///
    /// The namespace is matched by name: any name of the link's namespace that `onsite`
    /// knows selects the local name there.
    pub fn ns_title(&self, onsite: Option<&Site>) -> Result<String, LinkError> {
        let name = match onsite {
            None => self.local_ns_name(&self.site),
            Some(onsite) => {
                let matched = self.namespace_info().and_then(|ns| {
                    ns.names()
                        .find_map(|name| onsite.namespaces().lookup_name(name))
                        .map(|ns| ns.custom_name.clone())
                });
                match matched {
                    Some(name) => name,
                    None if self.namespace == Namespace::MAIN => CompactString::default(),
                    None => {
                        return Err(invalid(
                            &self.canonical_title(),
                            InvalidTitleReason::NoCorrespondingNamespace,
                        ))
                    }
                }
            }
        };

        if self.namespace == Namespace::MAIN {
            Ok(self.title.clone())
        } else {
            Ok(format!("{}:{}", name, self.title))
        }
    }

    /// Wikitext of this link as it has to be written on `onsite` (defaults to the
    /// resolved site), e.g. `[[de:Haus]]` or `[[wiktionary:en:house]]`.
    pub fn astext(&self, onsite: Option<&Site>) -> String {
        let onsite = onsite.unwrap_or(&self.site);

        let mut title = if self.namespace == Namespace::MAIN {
            self.title.clone()
        } else {
            format!("{}:{}", self.local_ns_name(onsite), self.title)
        };
        if let Some(section) = &self.section {
            title.push('#');
            title.push_str(section);
        }

        if *onsite == self.site {
            format!("[[{title}]]")
        } else if onsite.family() == self.site.family() || self.site.family() == self.site.code() {
            format!("[[{}:{title}]]", self.site.code())
        } else {
            format!("[[{}:{title}]]", self.site.sitename())
        }
    }
}

impl Display for ParsedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.astext(None))
    }
}

/// A link as found in wikitext, resolved lazily.
#[derive(Debug, Clone)]
pub struct Link {
    text: String,
    source: Site,
    default_namespace: i32,
    anchor: Option<String>,
    parsed: OnceLock<Result<ParsedLink, LinkError>>,
}

impl Link {
    /// Create a link from the text between `[[` and `]]`, found on `source`.
    ///
    /// Nothing is parsed yet, so this never fails.
    pub fn new(text: &str, source: &Site) -> Self {
        let (text, anchor) = match text.split_once('|') {
            Some((text, anchor)) => (text, Some(anchor.to_string())),
            None => (text, None),
        };

        Self {
            text: text.to_string(),
            source: source.clone(),
            default_namespace: Namespace::MAIN,
            anchor,
            parsed: OnceLock::new(),
        }
    }

    /// A link whose fields are already known. The title is used as is, without
    /// validation.
    pub fn resolved(site: &Site, namespace: i32, title: &str) -> Self {
        let parsed = ParsedLink {
            site: site.clone(),
            namespace,
            title: title.to_string(),
            section: None,
            is_interwiki: false,
            leading_colon: false,
        };

        Self {
            text: parsed.canonical_title(),
            source: site.clone(),
            default_namespace: namespace,
            anchor: None,
            parsed: OnceLock::from(Ok(parsed)),
        }
    }

    /// The namespace used when the text has no namespace prefix (e.g. 10 for
    /// transclusions).
    pub fn with_default_namespace(self, namespace: i32) -> Self {
        Self {
            default_namespace: namespace,
            parsed: OnceLock::new(),
            ..self
        }
    }

    pub fn with_anchor(&self, anchor: Option<&str>) -> Self {
        Self {
            anchor: anchor.map(str::to_string),
            ..self.clone()
        }
    }

    /// The same target with a different section.
    pub fn with_section(&self, section: Option<&str>) -> Result<Self, LinkError> {
        let mut parsed = self.parsed()?.clone();
        parsed.section = section.map(str::to_string);

        let mut text = parsed.ns_title(None)?;
        if let Some(section) = section {
            text.push('#');
            text.push_str(section);
        }

        Ok(Self {
            text,
            source: self.source.clone(),
            default_namespace: self.default_namespace,
            anchor: self.anchor.clone(),
            parsed: OnceLock::from(Ok(parsed)),
        })
    }

    /// The raw text, without the anchor.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> &Site {
        &self.source
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn parsed(&self) -> Result<&ParsedLink, LinkError> {
        match self.parsed.get_or_init(|| self.parse()) {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(e.clone()),
        }
    }

    pub fn site(&self) -> Result<&Site, LinkError> {
        self.parsed().map(ParsedLink::site)
    }

    pub fn namespace(&self) -> Result<i32, LinkError> {
        self.parsed().map(ParsedLink::namespace)
    }

    pub fn title(&self) -> Result<&str, LinkError> {
        self.parsed().map(ParsedLink::title)
    }

    pub fn section(&self) -> Result<Option<&str>, LinkError> {
        self.parsed().map(ParsedLink::section)
    }

    pub fn is_interwiki(&self) -> Result<bool, LinkError> {
        self.parsed().map(ParsedLink::is_interwiki)
    }

    pub fn canonical_title(&self) -> Result<String, LinkError> {
        self.parsed().map(ParsedLink::canonical_title)
    }

    pub fn astext(&self, onsite: Option<&Site>) -> Result<String, LinkError> {
        self.parsed().map(|parsed| parsed.astext(onsite))
    }

    fn normalized_text(&self) -> Result<String, LinkError> {
        let decoded = decode_entities(&self.text);
        if contains_replacement_char(&decoded) {
            return Err(invalid(&self.text, InvalidTitleReason::IllegalCharacters));
        }
        let decoded = decode_percent(&decoded);
        if contains_replacement_char(&decoded) {
            return Err(invalid(&self.text, InvalidTitleReason::IllegalCharacters));
        }
        Ok(normalize_title_text(&decoded))
    }

    /// Determine only the `(family, code)` the link points to, looking at the first
    /// prefix. Cheaper than a full parse and works for language codes of sites that are
    /// not configured.
    pub fn parse_site(&self) -> Result<(CompactString, CompactString), LinkError> {
        let text = self.normalized_text()?;
        let source = &self.source;
        let sites = source.sites();

        let mut rest = text.as_str();
        while let Some(colon) = find_colon(rest, 0) {
            if colon == 0 {
                rest = rest.trim_start_matches(':').trim_start_matches(' ');
                continue;
            }

            let prefix = fold_case(&rest[..colon]);
            if source.namespaces().lookup_name(&prefix).is_some() {
                break;
            }
            if sites.family_has_code(source.family(), &prefix) {
                return Ok((source.family().into(), prefix.into()));
            }
            return match source.interwiki(&prefix) {
                Ok(Some(site)) => Ok((site.family().into(), site.code().into())),
                Ok(None) => break,
                Err(e) => Err(LinkError::UnknownSite {
                    text: self.text.clone(),
                    source: e,
                }),
            };
        }

        Ok((source.family().into(), source.code().into()))
    }

    #[instrument(level = "debug", skip(self), fields(text = %self.text, source = %self.source))]
    fn parse(&self) -> Result<ParsedLink, LinkError> {
        let text = self.normalized_text()?;

        let mut site = self.source.clone();
        let mut namespace = self.default_namespace;
        let mut ns_prefix = false;
        let mut is_interwiki = false;
        let mut leading_colon = false;
        let mut first_other_site: Option<Site> = None;

        let mut rest = text.as_str();
        while let Some(colon) = find_colon(rest, 0) {
            if colon == 0 {
                // initial colon means main namespace instead of the default one
                leading_colon |= rest.len() == text.len();
                namespace = Namespace::MAIN;
                rest = rest.trim_start_matches(':').trim_start_matches(' ');
                continue;
            }

            let prefix = &rest[..colon];
            let after = rest[colon..].trim_start_matches(':').trim_start_matches(' ');

            if let Some(ns) = site.namespaces().lookup_name(prefix) {
                namespace = ns.id;
                ns_prefix = true;
                rest = after;
                break;
            }

            let new_site = match site.interwiki(prefix) {
                Ok(Some(new_site)) => new_site,
                // not a known prefix, part of the title
                Ok(None) => break,
                Err(source) => {
                    return Err(LinkError::UnknownSite {
                        text: text.clone(),
                        source,
                    })
                }
            };

            if first_other_site.is_some() {
                if !site.local_interwiki(prefix) {
                    tracing::debug!(
                        message = "rejecting interwiki hop through non-local prefix",
                        prefix,
                        via = %site
                    );
                    return Err(invalid(&text, InvalidTitleReason::NonLocalInterwiki));
                }
            } else if new_site != self.source {
                first_other_site = Some(new_site.clone());
            }

            site = new_site;
            is_interwiki = true;
            rest = after;
        }

        let (title, section) = match rest.split_once('#') {
            Some((title, section)) => (title.trim_end(), Some(section.trim_start().to_string())),
            None => (rest, None),
        };

        if ns_prefix {
            if title.is_empty() {
                return Err(invalid(&text, InvalidTitleReason::NoTitle));
            }
            if let (Some(colon), Some(ns)) = (find_colon(title, 0), site.namespace(namespace)) {
                if namespace >= 0 {
                    let other = site.namespace(ns.associated_id());
                    if other.is_some_and(|other| other.id == Namespace::MAIN)
                        && site.namespaces().lookup_name(&title[..colon]).is_some()
                    {
                        return Err(invalid(&text, InvalidTitleReason::TalkNamespaceCollision));
                    }
                }
            }
        }

        if ILLEGAL_TITLE.is_match(title) {
            return Err(invalid(title, InvalidTitleReason::IllegalCharacters));
        }

        if title.contains('.')
            && (title == "."
                || title == ".."
                || title.starts_with("./")
                || title.starts_with("../")
                || title.contains("/./")
                || title.contains("/../")
                || title.ends_with("/.")
                || title.ends_with("/.."))
        {
            return Err(invalid(title, InvalidTitleReason::DotCombination));
        }

        if title.contains("~~~") {
            return Err(invalid(title, InvalidTitleReason::TildeSequence));
        }

        // empty local links can only be self links with a fragment
        if title.trim_matches(' ').is_empty() && !is_interwiki {
            return Err(invalid(&text, InvalidTitleReason::Empty));
        }

        let case = site
            .namespace(namespace)
            .map(|ns| ns.case)
            .unwrap_or_default();
        let title = match case {
            NamespaceCase::FirstLetter => first_upper(title).into_owned(),
            NamespaceCase::CaseSensitive => title.to_string(),
        };

        // uppercasing may change the length
        if namespace != Namespace::SPECIAL && title.len() > MAX_TITLE_BYTES {
            return Err(invalid(&title, InvalidTitleReason::OverLength));
        }

        Ok(ParsedLink {
            site,
            namespace,
            title,
            section,
            is_interwiki,
            leading_colon,
        })
    }
}

impl Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parsed() {
            Ok(parsed) => Display::fmt(parsed, f),
            Err(_) => write!(f, "[[{}]]", self.text),
        }
    }
}
