use std::{
    fmt::{self, Debug, Display},
    hash::{Hash, Hasher},
    sync::Arc,
};

use compact_str::{format_compact, CompactString};
use rustc_hash::FxHashMap;

use crate::utils::fold_case;

/// The title casing strategy of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NamespaceCase {
    /// The first letter of every title is uppercased.
    #[default]
    FirstLetter,
    CaseSensitive,
}

impl NamespaceCase {
    /// Parse the value used by the MediaWiki API and XML dumps (`first-letter`, `case-sensitive`).
    pub fn from_mediawiki(value: &str) -> Option<Self> {
        match value {
            "first-letter" => Some(NamespaceCase::FirstLetter),
            "case-sensitive" => Some(NamespaceCase::CaseSensitive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceCase::FirstLetter => "first-letter",
            NamespaceCase::CaseSensitive => "case-sensitive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub id: i32,
    /// Local display name, e.g. `Benutzer` on German wikis. Empty for the main namespace.
    pub custom_name: CompactString,
    /// Canonical English name, e.g. `User`.
    pub canonical_name: CompactString,
    pub aliases: Vec<CompactString>,
    pub case: NamespaceCase,
    pub content: bool,
    pub subpages: bool,
}

impl Namespace {
    pub const MEDIA: i32 = -2;
    pub const SPECIAL: i32 = -1;
    pub const MAIN: i32 = 0;
    pub const TALK: i32 = 1;
    pub const USER: i32 = 2;
    pub const USER_TALK: i32 = 3;
    pub const PROJECT: i32 = 4;
    pub const PROJECT_TALK: i32 = 5;
    pub const FILE: i32 = 6;
    pub const FILE_TALK: i32 = 7;
    pub const MEDIAWIKI: i32 = 8;
    pub const MEDIAWIKI_TALK: i32 = 9;
    pub const TEMPLATE: i32 = 10;
    pub const TEMPLATE_TALK: i32 = 11;
    pub const HELP: i32 = 12;
    pub const HELP_TALK: i32 = 13;
    pub const CATEGORY: i32 = 14;
    pub const CATEGORY_TALK: i32 = 15;

    pub fn new(id: i32, name: &str) -> Self {
        Self {
            id,
            custom_name: name.into(),
            canonical_name: name.into(),
            aliases: Vec::new(),
            case: NamespaceCase::FirstLetter,
            content: id == Self::MAIN,
            subpages: false,
        }
    }

    pub fn with_canonical_name(mut self, canonical: &str) -> Self {
        self.canonical_name = canonical.into();
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_case(mut self, case: NamespaceCase) -> Self {
        self.case = case;
        self
    }

    pub const fn is_talk(&self) -> bool {
        self.id > Self::MAIN && self.id % 2 == 1
    }

    pub const fn talk_id(&self) -> i32 {
        if self.is_talk() {
            self.id
        } else {
            self.id + 1
        }
    }

    pub const fn subject_id(&self) -> i32 {
        if self.is_talk() {
            self.id - 1
        } else {
            self.id
        }
    }

    /// talk -> subject, subject -> talk
    pub const fn associated_id(&self) -> i32 {
        if self.is_talk() {
            self.id - 1
        } else {
            self.id + 1
        }
    }

    /// All non-empty names this namespace can be addressed with.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.custom_name.as_str())
            .chain(std::iter::once(self.canonical_name.as_str()))
            .chain(self.aliases.iter().map(CompactString::as_str))
            .filter(|name| !name.is_empty())
    }
}

/// The namespace table of a site, with a case-insensitive name index.
#[derive(Debug, Clone, Default)]
pub struct Namespaces {
    by_id: FxHashMap<i32, Namespace>,
    by_name: FxHashMap<String, i32>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// The namespaces present on every MediaWiki installation, with their canonical names.
    pub fn builtin() -> Self {
        const BUILTIN: &[(i32, &str)] = &[
            (Namespace::MEDIA, "Media"),
            (Namespace::SPECIAL, "Special"),
            (Namespace::MAIN, ""),
            (Namespace::TALK, "Talk"),
            (Namespace::USER, "User"),
            (Namespace::USER_TALK, "User talk"),
            (Namespace::PROJECT, "Project"),
            (Namespace::PROJECT_TALK, "Project talk"),
            (Namespace::FILE, "File"),
            (Namespace::FILE_TALK, "File talk"),
            (Namespace::MEDIAWIKI, "MediaWiki"),
            (Namespace::MEDIAWIKI_TALK, "MediaWiki talk"),
            (Namespace::TEMPLATE, "Template"),
            (Namespace::TEMPLATE_TALK, "Template talk"),
            (Namespace::HELP, "Help"),
            (Namespace::HELP_TALK, "Help talk"),
            (Namespace::CATEGORY, "Category"),
            (Namespace::CATEGORY_TALK, "Category talk"),
        ];

        let mut namespaces = Self::new();
        for (id, name) in BUILTIN {
            let mut namespace = Namespace::new(*id, name);
            match *id {
                Namespace::FILE => namespace = namespace.with_alias("Image"),
                Namespace::FILE_TALK => namespace = namespace.with_alias("Image talk"),
                _ => {}
            }
            namespaces.insert(namespace);
        }
        namespaces
    }

    /// Insert or replace a namespace.
    pub fn insert(&mut self, namespace: Namespace) {
        if let Some(old) = self.by_id.remove(&namespace.id) {
            self.by_name.retain(|_, id| *id != old.id);
        }
        for name in namespace.names() {
            self.by_name.insert(fold_case(name), namespace.id);
        }
        self.by_id.insert(namespace.id, namespace);
    }

    /// Add an alias to an existing namespace. Returns false if the namespace is unknown.
    pub fn add_alias(&mut self, id: i32, alias: &str) -> bool {
        let Some(namespace) = self.by_id.get_mut(&id) else {
            return false;
        };
        if !alias.trim().is_empty() {
            namespace.aliases.push(alias.into());
            self.by_name.insert(fold_case(alias), id);
        }
        true
    }

    pub fn get(&self, id: i32) -> Option<&Namespace> {
        self.by_id.get(&id)
    }

    /// Find a namespace by any of its names, ignoring case, `_`/space differences and
    /// surrounding whitespace. The main namespace cannot be looked up by name.
    pub fn lookup_name(&self, name: &str) -> Option<&Namespace> {
        let key = fold_case(name);
        if key.is_empty() {
            return None;
        }
        self.by_name.get(&key).and_then(|id| self.by_id.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Namespace> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Where an interwiki prefix points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterwikiTarget {
    /// A site identified by family and code.
    Site {
        family: CompactString,
        code: CompactString,
    },
    /// An article URL (`https://host/wiki/$1`) that the [`Sites`] oracle has to map to a site.
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterwikiEntry {
    pub prefix: CompactString,
    pub target: InterwikiTarget,
    /// Whether links may be forwarded through this prefix to a further interwiki hop.
    pub local: bool,
}

impl InterwikiEntry {
    pub fn to_site(prefix: &str, family: &str, code: &str) -> Self {
        Self {
            prefix: prefix.into(),
            target: InterwikiTarget::Site {
                family: family.into(),
                code: code.into(),
            },
            local: true,
        }
    }

    pub fn to_url(prefix: &str, url: &str, local: bool) -> Self {
        Self {
            prefix: prefix.into(),
            target: InterwikiTarget::Url(url.to_string()),
            local,
        }
    }

    pub fn non_local(mut self) -> Self {
        self.local = false;
        self
    }
}

/// Static configuration of a single wiki.
#[derive(Debug, Clone)]
pub struct SiteInfo {
    family: CompactString,
    code: CompactString,
    lang: CompactString,
    dbname: CompactString,
    article_url: Option<String>,
    namespaces: Namespaces,
    interwiki: FxHashMap<String, InterwikiEntry>,
}

impl SiteInfo {
    /// A site with the built-in namespaces and no interwiki map.
    pub fn new(family: &str, code: &str) -> Self {
        Self {
            family: family.into(),
            code: code.into(),
            lang: code.into(),
            dbname: dbname_for(family, code),
            article_url: None,
            namespaces: Namespaces::builtin(),
            interwiki: FxHashMap::default(),
        }
    }

    pub fn with_lang(mut self, lang: &str) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_dbname(mut self, dbname: &str) -> Self {
        self.dbname = dbname.into();
        self
    }

    pub fn with_article_url(mut self, url: &str) -> Self {
        self.article_url = Some(url.to_string());
        self
    }

    pub fn with_namespaces(mut self, namespaces: Namespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespaces.insert(namespace);
        self
    }

    pub fn with_interwiki(mut self, entry: InterwikiEntry) -> Self {
        self.interwiki.insert(fold_case(&entry.prefix), entry);
        self
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    pub fn article_url(&self) -> Option<&str> {
        self.article_url.as_deref()
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    pub fn namespaces_mut(&mut self) -> &mut Namespaces {
        &mut self.namespaces
    }

    pub fn interwiki_entry(&self, prefix: &str) -> Option<&InterwikiEntry> {
        self.interwiki.get(&fold_case(prefix))
    }

    pub fn interwiki_entries(&self) -> impl Iterator<Item = &InterwikiEntry> {
        self.interwiki.values()
    }

    /// `family:code`
    pub fn sitename(&self) -> CompactString {
        format_compact!("{}:{}", self.family, self.code)
    }
}

/// The database name MediaWiki uses for a site, e.g. `enwiki` or `dewiktionary`.
pub fn dbname_for(family: &str, code: &str) -> CompactString {
    let code = code.replace('-', "_");
    match family {
        "wikipedia" => format_compact!("{code}wiki"),
        "wikidata" | "commons" | "meta" | "species" | "mediawiki" if code == family => {
            format_compact!("{family}wiki")
        }
        _ => format_compact!("{code}{family}"),
    }
}

/// Failures while constructing a site.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SiteError {
    #[error("site {family}:{code} is not configured")]
    UnknownSite {
        family: CompactString,
        code: CompactString,
    },
    #[error("no configured site serves {url}")]
    UnknownUrl { url: String },
}

/// The site oracle consulted while resolving links.
///
/// Implementations decide which sites exist and how they are configured; the resolver
/// only ever asks through this trait.
pub trait Sites: Debug + Send + Sync {
    fn site_info(&self, family: &str, code: &str) -> Result<Arc<SiteInfo>, SiteError>;

    /// Find the site serving the given article URL (`$1` placeholder included).
    fn site_info_by_url(&self, url: &str) -> Result<Arc<SiteInfo>, SiteError>;

    /// Returns true if `code` is a language code of `family`.
    fn family_has_code(&self, family: &str, code: &str) -> bool;

    /// The code used when a bare family name is used as an interwiki prefix.
    /// `None` if `family` is not a known family.
    fn family_default_code(&self, family: &str) -> Option<CompactString>;
}

/// A handle to a configured site. Cheap to clone; compares by family and code.
#[derive(Clone)]
pub struct Site {
    info: Arc<SiteInfo>,
    sites: Arc<dyn Sites>,
}

impl Site {
    pub fn new(info: Arc<SiteInfo>, sites: Arc<dyn Sites>) -> Self {
        Self { info, sites }
    }

    pub fn load(sites: &Arc<dyn Sites>, family: &str, code: &str) -> Result<Self, SiteError> {
        let info = sites.site_info(family, code)?;
        Ok(Self::new(info, sites.clone()))
    }

    pub fn info(&self) -> &SiteInfo {
        &self.info
    }

    pub fn sites(&self) -> &Arc<dyn Sites> {
        &self.sites
    }

    pub fn family(&self) -> &str {
        self.info.family()
    }

    pub fn code(&self) -> &str {
        self.info.code()
    }

    pub fn lang(&self) -> &str {
        self.info.lang()
    }

    pub fn dbname(&self) -> &str {
        self.info.dbname()
    }

    pub fn sitename(&self) -> CompactString {
        self.info.sitename()
    }

    pub fn namespaces(&self) -> &Namespaces {
        self.info.namespaces()
    }

    pub fn namespace(&self, id: i32) -> Option<&Namespace> {
        self.info.namespaces().get(id)
    }

    /// Another site reachable through the same oracle.
    pub fn sibling(&self, family: &str, code: &str) -> Result<Site, SiteError> {
        Site::load(&self.sites, family, code)
    }

    /// Resolve an interwiki prefix used on this site.
    ///
    /// Checked in order: a language code of this site's family, an entry of the interwiki
    /// map, the name of a family.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if `prefix` is no interwiki prefix at all, `Err` if it is one but the
    /// target site cannot be constructed.
    pub fn interwiki(&self, prefix: &str) -> Result<Option<Site>, SiteError> {
        let key = fold_case(prefix);
        if key.is_empty() {
            return Ok(None);
        }

        if self.sites.family_has_code(self.family(), &key) {
            return self.sibling(self.family(), &key).map(Some);
        }

        if let Some(entry) = self.info.interwiki.get(&key) {
            let info = match &entry.target {
                InterwikiTarget::Site { family, code } => self.sites.site_info(family, code)?,
                InterwikiTarget::Url(url) => self.sites.site_info_by_url(url)?,
            };
            return Ok(Some(Site::new(info, self.sites.clone())));
        }

        if let Some(default_code) = self.sites.family_default_code(&key) {
            let code = if self.sites.family_has_code(&key, self.code()) {
                self.code()
            } else {
                default_code.as_str()
            };
            return self.sibling(&key, code).map(Some);
        }

        Ok(None)
    }

    /// Whether a link may continue to another interwiki hop after passing through `prefix`.
    pub fn local_interwiki(&self, prefix: &str) -> bool {
        let key = fold_case(prefix);
        if self.sites.family_has_code(self.family(), &key) {
            return true;
        }
        if let Some(entry) = self.info.interwiki.get(&key) {
            return entry.local;
        }
        self.sites.family_default_code(&key).is_some()
    }
}

impl PartialEq for Site {
    fn eq(&self, other: &Self) -> bool {
        self.family() == other.family() && self.code() == other.code()
    }
}

impl Eq for Site {}

impl Hash for Site {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.family().hash(state);
        self.code().hash(state);
    }
}

impl Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Site").field(&self.sitename()).finish()
    }
}

impl Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family(), self.code())
    }
}

/// An in-memory [`Sites`] oracle.
#[derive(Debug, Default)]
pub struct SiteRegistry {
    sites: FxHashMap<(CompactString, CompactString), Arc<SiteInfo>>,
    // insertion ordered, the first code is the family default
    families: FxHashMap<CompactString, Vec<CompactString>>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a site. Its code is added to the codes of its family.
    pub fn register(&mut self, info: SiteInfo) -> &mut Self {
        let family = CompactString::from(info.family());
        let code = CompactString::from(info.code());

        let codes = self.families.entry(family.clone()).or_default();
        if !codes.contains(&code) {
            codes.push(code.clone());
        }
        self.sites.insert((family, code), Arc::new(info));
        self
    }

    /// Declare the language codes of a family, including codes of sites that are not
    /// (yet) configured. Links through such codes fail with [`SiteError::UnknownSite`].
    pub fn register_family<I, S>(&mut self, family: &str, codes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known = self.families.entry(family.into()).or_default();
        for code in codes {
            let code = CompactString::from(code.as_ref());
            if !known.contains(&code) {
                known.push(code);
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("https:")
        .or_else(|| url.strip_prefix("http:"))
        .unwrap_or(url)
}

impl Sites for SiteRegistry {
    fn site_info(&self, family: &str, code: &str) -> Result<Arc<SiteInfo>, SiteError> {
        self.sites
            .get(&(CompactString::from(family), CompactString::from(code)))
            .cloned()
            .ok_or_else(|| SiteError::UnknownSite {
                family: family.into(),
                code: code.into(),
            })
    }

    fn site_info_by_url(&self, url: &str) -> Result<Arc<SiteInfo>, SiteError> {
        let wanted = strip_scheme(url);
        self.sites
            .values()
            .find(|info| info.article_url().map(strip_scheme) == Some(wanted))
            .cloned()
            .ok_or_else(|| SiteError::UnknownUrl {
                url: url.to_string(),
            })
    }

    fn family_has_code(&self, family: &str, code: &str) -> bool {
        self.families
            .get(family)
            .is_some_and(|codes| codes.iter().any(|c| c == code))
    }

    fn family_default_code(&self, family: &str) -> Option<CompactString> {
        self.families
            .get(family)
            .and_then(|codes| codes.first())
            .cloned()
    }
}
