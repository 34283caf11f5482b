use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use serde_json::Value;

use super::{
    entity::WikibaseEntity,
    error::{DataError, WikibaseError},
    id::{EntityId, EntityKind},
    repository::{EditOptions, Repository},
};
use crate::{link::Link, site::Site};

/// The page of an entity on the repository wiki: its title plus the entity.
///
/// Entity operations are reachable through `Deref`.
#[derive(Debug)]
pub struct WikibasePage {
    title: Link,
    entity: WikibaseEntity,
}

fn page_namespace(kind: EntityKind) -> Result<i32, DataError> {
    match (kind, kind.namespace()) {
        // media info pages are titled after their file
        (EntityKind::MediaInfo, _) | (_, None) => Err(DataError::InvalidValue {
            field: "id".into(),
            message: format!("{kind} entities have no page titled after their id"),
        }),
        (_, Some(namespace)) => Ok(namespace),
    }
}

impl WikibasePage {
    /// The page of `id` on the repository site `repo_site`.
    pub fn new(repo_site: &Site, repo: Arc<dyn Repository>, id: EntityId) -> Result<Self, WikibaseError> {
        let namespace = page_namespace(id.kind())?;
        Ok(Self {
            title: Link::resolved(repo_site, namespace, id.as_str()),
            entity: WikibaseEntity::new(repo, id),
        })
    }

    /// The entity a link such as `Property:P31` or `d:Q42` points to.
    pub fn from_link(link: &Link, repo: Arc<dyn Repository>) -> Result<Self, WikibaseError> {
        let parsed = link.parsed()?;
        let kind = EntityKind::for_namespace(parsed.namespace()).ok_or_else(|| DataError::InvalidValue {
            field: "title".into(),
            message: format!("namespace {} holds no entities", parsed.namespace()),
        })?;
        let id = EntityId::parse_as(parsed.title(), kind)?;
        Self::new(parsed.site(), repo, id)
    }

    pub fn title(&self) -> &Link {
        &self.title
    }

    pub fn entity(&self) -> &WikibaseEntity {
        &self.entity
    }

    pub fn into_entity(self) -> WikibaseEntity {
        self.entity
    }

    /// Like [`WikibaseEntity::edit_entity`]; a created entity also gets its title.
    pub fn edit_entity(&mut self, data: Option<&Value>, options: EditOptions) -> Result<(), WikibaseError> {
        let was_new = self.entity.id().is_new();
        self.entity.edit_entity(data, options)?;
        if was_new {
            let site = self.title.site()?.clone();
            let namespace = self.title.namespace()?;
            self.title = Link::resolved(&site, namespace, self.entity.id().as_str());
        }
        Ok(())
    }
}

impl Deref for WikibasePage {
    type Target = WikibaseEntity;

    fn deref(&self) -> &Self::Target {
        &self.entity
    }
}

impl DerefMut for WikibasePage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entity
    }
}
