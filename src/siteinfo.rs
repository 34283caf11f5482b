use std::{fmt::Debug, io::BufRead};

use compact_str::CompactString;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::instrument;

use crate::site::{InterwikiEntry, Namespace, NamespaceCase, Namespaces, SiteInfo};

#[derive(Debug, thiserror::Error)]
pub enum SiteInfoError {
    #[error("JSON error")]
    JsonError(#[from] serde_json::Error),
    #[error("XML error")]
    XmlError(#[from] quick_xml::Error),
    #[error("unexpected end of file")]
    Eof,
    #[error("missing <dbname> in siteinfo")]
    MissingDbName,
    #[error("cannot derive family and code from database name `{0}`")]
    UnknownDbName(String),
    #[error("invalid namespace entry (key {key:?})")]
    InvalidNamespace { key: Option<String> },
    #[error("mismatched closing tag `{actual}`, expected {expected}")]
    MismatchedTag { expected: String, actual: String },
}

/// Split a database name into family and code: `enwiki` -> (`wikipedia`, `en`).
pub fn family_and_code_from_dbname(dbname: &str) -> Option<(CompactString, CompactString)> {
    const SINGLE_SITE_FAMILIES: &[(&str, &str)] = &[
        ("wikidatawiki", "wikidata"),
        ("commonswiki", "commons"),
        ("metawiki", "meta"),
        ("specieswiki", "species"),
        ("mediawikiwiki", "mediawiki"),
    ];
    const SUFFIXES: &[(&str, &str)] = &[
        ("wiktionary", "wiktionary"),
        ("wikibooks", "wikibooks"),
        ("wikinews", "wikinews"),
        ("wikiquote", "wikiquote"),
        ("wikisource", "wikisource"),
        ("wikiversity", "wikiversity"),
        ("wikivoyage", "wikivoyage"),
        ("wiki", "wikipedia"),
    ];

    if let Some((_, family)) = SINGLE_SITE_FAMILIES.iter().find(|(db, _)| *db == dbname) {
        return Some(((*family).into(), (*family).into()));
    }

    SUFFIXES.iter().find_map(|(suffix, family)| {
        let code = dbname.strip_suffix(suffix)?;
        if code.is_empty() {
            None
        } else {
            Some(((*family).into(), code.replace('_', "-").into()))
        }
    })
}

// `meta=siteinfo` encodes flags as `""` (formatversion 1) or booleans (formatversion 2);
// absence always means false
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::Null => false,
        _ => true,
    })
}

#[derive(Debug, Deserialize)]
struct RawGeneral {
    #[serde(alias = "dbname")]
    wikiid: Option<String>,
    lang: Option<String>,
    server: Option<String>,
    articlepath: Option<String>,
    case: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNamespace {
    id: i32,
    #[serde(alias = "*", default)]
    name: String,
    #[serde(default)]
    canonical: Option<String>,
    #[serde(default)]
    case: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    content: bool,
    #[serde(default, deserialize_with = "flag")]
    subpages: bool,
}

#[derive(Debug, Deserialize)]
struct RawNamespaceAlias {
    id: i32,
    #[serde(alias = "*")]
    alias: String,
}

#[derive(Debug, Deserialize)]
struct RawInterwiki {
    prefix: String,
    url: String,
    #[serde(default, deserialize_with = "flag")]
    local: bool,
}

#[derive(Debug, Deserialize)]
struct RawSiteInfo {
    general: Option<RawGeneral>,
    #[serde(default)]
    namespaces: FxHashMap<String, Value>,
    #[serde(default)]
    namespacealiases: Vec<RawNamespaceAlias>,
    #[serde(default)]
    interwikimap: Vec<RawInterwiki>,
}

impl SiteInfo {
    /// Build the configuration of `family:code` from an
    /// `action=query&meta=siteinfo&siprop=general|namespaces|namespacealiases|interwikimap`
    /// response. Both the full response and its `query` object are accepted, in
    /// formatversion 1 or 2.
    #[instrument(skip(json))]
    pub fn from_api_json(family: &str, code: &str, json: &Value) -> Result<SiteInfo, SiteInfoError> {
        let query = json.get("query").unwrap_or(json);
        let raw = RawSiteInfo::deserialize(query)?;

        let mut site_info = SiteInfo::new(family, code);
        let mut default_case = NamespaceCase::FirstLetter;

        if let Some(general) = raw.general {
            if let Some(dbname) = &general.wikiid {
                site_info = site_info.with_dbname(dbname);
            }
            if let Some(lang) = &general.lang {
                site_info = site_info.with_lang(lang);
            }
            if let (Some(server), Some(path)) = (&general.server, &general.articlepath) {
                let server = if server.starts_with("//") {
                    format!("https:{server}")
                } else {
                    server.clone()
                };
                site_info = site_info.with_article_url(&format!("{server}{path}"));
            }
            if let Some(case) = general.case.as_deref().and_then(NamespaceCase::from_mediawiki) {
                default_case = case;
            }
        }

        if !raw.namespaces.is_empty() {
            let builtin = Namespaces::builtin();
            let mut namespaces = Namespaces::new();

            for (key, entry) in raw.namespaces {
                let raw_ns = match RawNamespace::deserialize(&entry) {
                    Ok(raw_ns) => raw_ns,
                    Err(e) => {
                        if cfg!(feature = "strict") {
                            return Err(SiteInfoError::InvalidNamespace { key: Some(key) });
                        }
                        tracing::warn!(
                            message = "Ignoring malformed namespace entry",
                            key = key.as_str(),
                            error = %e
                        );
                        continue;
                    }
                };
                let canonical = raw_ns
                    .canonical
                    .as_deref()
                    .or_else(|| builtin.get(raw_ns.id).map(|ns| ns.canonical_name.as_str()))
                    .unwrap_or(raw_ns.name.as_str())
                    .to_string();
                let case = raw_ns
                    .case
                    .as_deref()
                    .and_then(NamespaceCase::from_mediawiki)
                    .unwrap_or(default_case);

                let mut namespace = Namespace::new(raw_ns.id, &raw_ns.name)
                    .with_canonical_name(&canonical)
                    .with_case(case);
                namespace.content = raw_ns.content;
                namespace.subpages = raw_ns.subpages;
                namespaces.insert(namespace);
            }

            for alias in raw.namespacealiases {
                if !namespaces.add_alias(alias.id, &alias.alias) {
                    tracing::warn!(
                        message = "Ignoring alias of unknown namespace",
                        id = alias.id,
                        alias = alias.alias.as_str()
                    );
                }
            }

            site_info = site_info.with_namespaces(namespaces);
        }

        for entry in raw.interwikimap {
            site_info = site_info.with_interwiki(InterwikiEntry::to_url(
                &entry.prefix,
                &entry.url,
                entry.local,
            ));
        }

        Ok(site_info)
    }

    /// Build a site configuration from the `<siteinfo>` header of an XML dump.
    ///
    /// Family and code are derived from `<dbname>`. Only the header is consumed, the
    /// reader is left positioned somewhere after `</siteinfo>`.
    pub fn from_dump_header<R: BufRead>(reader: R) -> Result<SiteInfo, SiteInfoError> {
        DumpHeaderReader::new(reader).read()
    }
}

// list of all tags that are relevant for the header
#[derive(PartialEq, Eq)]
enum Tag {
    MediaWiki,  // <mediawiki version="0.11" ...other attributes>...</mediawiki> is the root tag
    SiteInfo,   // <siteinfo><dbname>...</dbname><namespaces>...</namespaces> ...other tags</siteinfo>
    DbName,     // <dbname>dewiktionary</dbname>
    Base,       // <base>https://de.wiktionary.org/wiki/Wiktionary:Hauptseite</base>
    Case,       // <case>case-sensitive</case>
    Namespaces, // <namespaces><namespace key="0" /> ...more namespace tags</namespaces>
    Namespace {
        key: Option<String>,
        case: Option<String>,
    }, // <namespace key="1" case="first-letter">Diskussion</namespace>
    Unknown(CompactString), // any other tag
}

impl Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tag::MediaWiki => write!(f, "<mediawiki>"),
            Tag::SiteInfo => write!(f, "<siteinfo>"),
            Tag::DbName => write!(f, "<dbname>"),
            Tag::Base => write!(f, "<base>"),
            Tag::Case => write!(f, "<case>"),
            Tag::Namespaces => write!(f, "<namespaces>"),
            Tag::Namespace { key, .. } => write!(f, "<namespace key={:?}>", key),
            Tag::Unknown(name) => write!(f, "<{}>", name),
        }
    }
}

impl Tag {
    fn from_start_bytes(e: &BytesStart) -> Result<Self, quick_xml::Error> {
        match e.name().as_ref() {
            b"mediawiki" => Ok(Tag::MediaWiki),
            b"siteinfo" => Ok(Tag::SiteInfo),
            b"dbname" => Ok(Tag::DbName),
            b"base" => Ok(Tag::Base),
            b"case" => Ok(Tag::Case),
            b"namespaces" => Ok(Tag::Namespaces),
            b"namespace" => {
                let mut key = None;
                let mut case = None;

                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    match attr.key.as_ref() {
                        b"key" => key = Some(attr.unescape_value()?.into_owned()),
                        b"case" => case = Some(attr.unescape_value()?.into_owned()),
                        _ => {}
                    }
                }

                Ok(Tag::Namespace { key, case })
            }
            other => Ok(Tag::Unknown(String::from_utf8_lossy(other).as_ref().into())),
        }
    }

    fn matches_end_bytes(&self, e: &BytesEnd) -> bool {
        match (self, e.name().as_ref()) {
            (Tag::MediaWiki, b"mediawiki") => true,
            (Tag::SiteInfo, b"siteinfo") => true,
            (Tag::DbName, b"dbname") => true,
            (Tag::Base, b"base") => true,
            (Tag::Case, b"case") => true,
            (Tag::Namespaces, b"namespaces") => true,
            (Tag::Namespace { .. }, b"namespace") => true,
            (Tag::Unknown(expected), actual) => expected.as_bytes() == actual,
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct PartialSiteInfo {
    dbname: Option<CompactString>,
    base: Option<String>,
    case: Option<NamespaceCase>,
    namespaces: Vec<(i32, String, Option<NamespaceCase>)>,
}

struct DumpHeaderReader<R: BufRead> {
    xml_parser: quick_xml::Reader<R>,
    buf: Vec<u8>,
    current_path: Vec<Tag>,
    // text of the currently open <namespace>, None if there was none yet
    namespace_text: Option<String>,
}

impl<R: BufRead> DumpHeaderReader<R> {
    fn new(reader: R) -> Self {
        Self {
            xml_parser: quick_xml::Reader::from_reader(reader),
            buf: Vec::with_capacity(8 * 1024),
            current_path: Vec::new(),
            namespace_text: None,
        }
    }

    fn add_namespace(
        &self,
        key: Option<&str>,
        case: Option<&str>,
        name: &str,
        partial: &mut PartialSiteInfo,
    ) -> Result<(), SiteInfoError> {
        let Some(id) = key.and_then(|key| key.parse().ok()) else {
            if cfg!(feature = "strict") {
                return Err(SiteInfoError::InvalidNamespace {
                    key: key.map(str::to_string),
                });
            }
            tracing::warn!(
                message = "Ignoring namespace with missing or invalid key",
                key,
                name,
                position = self.xml_parser.buffer_position()
            );
            return Ok(());
        };

        let case = case.and_then(NamespaceCase::from_mediawiki);
        partial.namespaces.push((id, name.to_string(), case));
        Ok(())
    }

    fn check_end_tag(
        current_path: &mut Vec<Tag>,
        xml_parser: &quick_xml::Reader<R>,
        e: &BytesEnd,
    ) -> Result<Option<Tag>, SiteInfoError> {
        let Some(tag) = current_path.pop() else {
            let tag = String::from_utf8_lossy(e.name().into_inner()).into_owned();
            tracing::error!(
                message = "Unexpected end tag",
                tag = tag.as_str(),
                position = xml_parser.buffer_position()
            );

            if cfg!(feature = "strict") {
                return Err(SiteInfoError::MismatchedTag {
                    expected: "nothing".into(),
                    actual: tag,
                });
            }
            tracing::warn!("Ignoring unexpected end tag. This may lead to incorrect results.");
            return Ok(None);
        };

        if !tag.matches_end_bytes(e) {
            let actual = String::from_utf8_lossy(e.name().as_ref()).into_owned();
            tracing::error!(
                message = "Mismatched tags",
                expected = ?tag,
                actual = actual.as_str(),
                current_path = ?current_path,
                position = xml_parser.buffer_position()
            );

            if cfg!(feature = "strict") {
                return Err(SiteInfoError::MismatchedTag {
                    expected: format!("{:?}", tag),
                    actual,
                });
            }
            tracing::warn!("Ignoring mismatched tag. This may lead to incorrect results.");
        }

        Ok(Some(tag))
    }

    #[instrument(skip(self))]
    fn read(mut self) -> Result<SiteInfo, SiteInfoError> {
        let mut partial = PartialSiteInfo::default();

        loop {
            match self.xml_parser.read_event_into(&mut self.buf)? {
                Event::Start(ref e) => {
                    let tag = Tag::from_start_bytes(e)?;
                    if matches!(tag, Tag::Namespace { .. }) {
                        self.namespace_text = None;
                    }
                    self.current_path.push(tag);
                }
                Event::Empty(ref e) => {
                    let tag = Tag::from_start_bytes(e)?;

                    use Tag::*;

                    self.current_path.push(tag);
                    if let [MediaWiki, SiteInfo, Namespaces, Namespace { key, case }] =
                        self.current_path.as_slice()
                    {
                        let (key, case) = (key.clone(), case.clone());
                        self.add_namespace(key.as_deref(), case.as_deref(), "", &mut partial)?;
                    }
                    self.current_path.pop();
                }
                Event::Text(e) => {
                    let text = e.unescape()?;

                    use Tag::*;

                    match self.current_path.as_slice() {
                        [MediaWiki, SiteInfo, DbName] => {
                            partial.dbname = Some(CompactString::from(text.trim()));
                        }
                        [MediaWiki, SiteInfo, Base] => {
                            partial.base = Some(text.trim().to_string());
                        }
                        [MediaWiki, SiteInfo, Case] => {
                            partial.case = NamespaceCase::from_mediawiki(text.trim());
                        }
                        [MediaWiki, SiteInfo, Namespaces, Namespace { .. }] => {
                            self.namespace_text
                                .get_or_insert_with(String::new)
                                .push_str(&text);
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => {
                    let closes_namespace = matches!(
                        self.current_path.as_slice(),
                        [Tag::MediaWiki, Tag::SiteInfo, Tag::Namespaces, Tag::Namespace { .. }]
                    );
                    let tag = Self::check_end_tag(&mut self.current_path, &self.xml_parser, e)?;

                    match tag {
                        Some(Tag::Namespace { key, case }) if closes_namespace => {
                            let name = self.namespace_text.take().unwrap_or_default();
                            self.add_namespace(
                                key.as_deref(),
                                case.as_deref(),
                                &name,
                                &mut partial,
                            )?;
                        }
                        // found the closing tag for siteinfo, we're done
                        Some(Tag::SiteInfo) => break,
                        _ => {}
                    }
                }
                Event::Eof => {
                    // we should never reach eof in a correct file because we break at </siteinfo>
                    tracing::error!(partial_site_info = ?partial, current_path = ?self.current_path);
                    return Err(SiteInfoError::Eof);
                }
                _ => {}
            }
            self.buf.clear();
        }

        partial.build()
    }
}

impl PartialSiteInfo {
    fn build(self) -> Result<SiteInfo, SiteInfoError> {
        let dbname = self.dbname.ok_or(SiteInfoError::MissingDbName)?;
        let (family, code) = family_and_code_from_dbname(&dbname)
            .ok_or_else(|| SiteInfoError::UnknownDbName(dbname.to_string()))?;

        let mut site_info = SiteInfo::new(&family, &code).with_dbname(&dbname);

        if let Some(base) = &self.base {
            if let Some(pos) = base.find("/wiki/") {
                site_info = site_info.with_article_url(&format!("{}$1", &base[..pos + 6]));
            }
        }

        if !self.namespaces.is_empty() {
            let builtin = Namespaces::builtin();
            let default_case = self.case.unwrap_or_default();
            let mut namespaces = Namespaces::new();

            for (id, name, case) in self.namespaces {
                let mut namespace = match builtin.get(id) {
                    Some(known) => {
                        let mut namespace = known.clone();
                        namespace.custom_name = name.as_str().into();
                        namespace
                    }
                    None => Namespace::new(id, &name),
                };
                namespace.case = case.unwrap_or(default_case);
                namespaces.insert(namespace);
            }
            site_info = site_info.with_namespaces(namespaces);
        }

        Ok(site_info)
    }
}
