//! Lifecycle shared by the three collection kinds: membership, cover
//! maintenance, ownership and cascading delete.

use async_trait::async_trait;
use futures::future::join_all;

use super::{Entity, Lazy, LazyMany, Team, User};
use crate::error::{ModelError, ModelResult};
use crate::store::{RecordStore, Relation};

/// Disjoint mutable borrows of a collection's association slots, so several
/// of them can be driven at once.
pub struct CollectionSlots<'a, M> {
    pub team: &'a mut Lazy<Team>,
    pub user: &'a mut Lazy<User>,
    pub cover: Option<&'a mut Lazy<M>>,
    pub members: &'a mut LazyMany<M>,
}

/// Collection
///
/// Implemented by `ImagesCollection`, `VideosCollection` and `NewsCollection`.
/// Concrete types supply their relations and slot borrows; membership and
/// cover bookkeeping are provided here.
#[async_trait]
pub trait Collection: Entity {
    type Member: Entity;

    /// Has-many relation from the collection to its members.
    const MEMBERS: &'static Relation;
    /// Belongs-to relation designating the cover, for cover-bearing kinds.
    const COVER: Option<&'static Relation>;
    const TEAM: &'static Relation;
    const USER: &'static Relation;
    /// Top-level directory holding every collection of this kind on disk.
    const DIRECTORY: &'static str;

    fn named(hashid: String, name: String, description: String) -> Self;

    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn set_details(&mut self, name: Option<String>, description: Option<String>);

    fn team_slot(&self) -> &Lazy<Team>;
    fn user_slot(&self) -> &Lazy<User>;
    fn cover_slot(&self) -> Option<&Lazy<Self::Member>>;
    fn members_slot(&self) -> &LazyMany<Self::Member>;
    fn slots_mut(&mut self) -> CollectionSlots<'_, Self::Member>;

    fn members(&self) -> ModelResult<&[Self::Member]> {
        self.members_slot().get(Self::MEMBERS.name)
    }

    /// The current cover. Always `None` for kinds without one.
    fn cover(&self) -> ModelResult<Option<&Self::Member>> {
        match (self.cover_slot(), Self::COVER) {
            (Some(slot), Some(relation)) => slot.get(relation.name),
            _ => Ok(None),
        }
    }

    fn team(&self) -> ModelResult<Option<&Team>> {
        self.team_slot().get(Self::TEAM.name)
    }

    fn user(&self) -> ModelResult<Option<&User>> {
        self.user_slot().get(Self::USER.name)
    }

    async fn load_members(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.slots_mut().members.load(store, Self::MEMBERS, id).await
    }

    async fn load_cover(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        match (self.slots_mut().cover, Self::COVER) {
            (Some(slot), Some(relation)) => slot.load(store, relation, id).await,
            _ => Ok(()),
        }
    }

    async fn load_team(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.slots_mut().team.load(store, Self::TEAM, id).await
    }

    async fn load_user(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.slots_mut().user.load(store, Self::USER, id).await
    }

    /// Loads every association concurrently; the first failure wins.
    async fn load_associations(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        let CollectionSlots {
            team,
            user,
            cover,
            members,
        } = self.slots_mut();

        let cover = async move {
            match (cover, Self::COVER) {
                (Some(slot), Some(relation)) => slot.load(store, relation, id).await,
                _ => Ok(()),
            }
        };

        futures::try_join!(
            team.load(store, Self::TEAM, id),
            user.load(store, Self::USER, id),
            members.load(store, Self::MEMBERS, id),
            cover,
        )?;
        Ok(())
    }

    async fn set_team(&mut self, store: &dyn RecordStore, team: Option<&Team>) -> ModelResult<()> {
        let id = self.require_id()?;
        let team_id = team.map(|team| team.require_id()).transpose()?;
        store.set_related(Self::TEAM, id, team_id).await?;
        self.slots_mut().team.set(team.cloned());
        Ok(())
    }

    async fn set_user(&mut self, store: &dyn RecordStore, user: Option<&User>) -> ModelResult<()> {
        let id = self.require_id()?;
        let user_id = user.map(|user| user.require_id()).transpose()?;
        store.set_related(Self::USER, id, user_id).await?;
        self.slots_mut().user.set(user.cloned());
        Ok(())
    }

    /// Links `member` into the collection. Cover-bearing kinds promote it to
    /// cover when none is set yet.
    ///
    /// The member list is loaded first when needed, so the in-memory list is
    /// always the complete one after this returns.
    async fn add_member(
        &mut self,
        store: &dyn RecordStore,
        member: &Self::Member,
    ) -> ModelResult<()> {
        let id = self.require_id()?;
        let member_id = member.require_id()?;

        self.load_members(store).await?;
        store.add_related(Self::MEMBERS, id, member_id).await?;

        let CollectionSlots { cover, members, .. } = self.slots_mut();
        if members.position(member_id).is_none() {
            members.items_mut().push(member.clone());
        }

        if let (Some(cover), Some(relation)) = (cover, Self::COVER) {
            cover.load(store, relation, id).await?;
            if cover.loaded_value().is_none() {
                store.set_related(relation, id, Some(member_id)).await?;
                cover.set(Some(member.clone()));
            }
        }
        Ok(())
    }

    /// Unlinks a member that is tracked in the loaded member list.
    ///
    /// The member leaves the in-memory list before the store call and is put
    /// back at the same position if that call fails. When the member was the
    /// cover, the first remaining member becomes the cover, or none; if that
    /// reassignment fails the member is linked again and stays the cover.
    async fn remove_member(
        &mut self,
        store: &dyn RecordStore,
        member: &Self::Member,
    ) -> ModelResult<()> {
        let id = self.require_id()?;
        let member_id = member.require_id()?;

        let Some(position) = self.members_slot().position(member_id) else {
            return Err(ModelError::RelationViolation {
                collection: self.hashid().to_string(),
                member: member.hashid().to_string(),
            });
        };

        let CollectionSlots {
            mut cover, members, ..
        } = self.slots_mut();
        if let (Some(cover), Some(relation)) = (cover.as_deref_mut(), Self::COVER) {
            cover.load(store, relation, id).await?;
        }

        let removed = members.items_mut().remove(position);
        if let Err(error) = store.remove_related(Self::MEMBERS, id, member_id).await {
            members.items_mut().insert(position, removed);
            return Err(error.into());
        }

        if let (Some(cover), Some(relation)) = (cover, Self::COVER) {
            let was_cover = cover.loaded_value().and_then(|current| current.id()) == Some(member_id);
            if was_cover {
                let next = members.items_mut().first().cloned();
                let next_id = next.as_ref().and_then(|next| next.id());
                if let Err(error) = store.set_related(relation, id, next_id).await {
                    if let Err(relink) = store.add_related(Self::MEMBERS, id, member_id).await {
                        tracing::error!(error = %relink, member = removed.hashid(), "removed cover could not be relinked");
                    }
                    members.items_mut().insert(position, removed);
                    return Err(error.into());
                }
                cover.set(next);
            }
        }
        Ok(())
    }

    /// Deletes every member concurrently and waits for all of them.
    ///
    /// Members already deleted stay deleted when another one fails; the first
    /// failure is returned and the survivors stay in the member list.
    async fn delete_members(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        self.load_members(store).await?;

        let CollectionSlots { cover, members, .. } = self.slots_mut();
        let items = members.items_mut();
        let results = join_all(items.iter_mut().map(|member| member.delete(store))).await;

        let mut failure = None;
        let mut survivors = Vec::new();
        for (member, result) in std::mem::take(items).into_iter().zip(results) {
            if let Err(error) = result {
                tracing::warn!(member = member.hashid(), %error, "cascade delete left a member behind");
                survivors.push(member);
                failure.get_or_insert(error);
            }
        }
        *items = survivors;

        if let Some(cover) = cover {
            let kept = cover
                .loaded_value()
                .and_then(|current| current.id())
                .is_some_and(|cover_id| items.iter().any(|member| member.id() == Some(cover_id)));
            if !kept {
                cover.set(None);
            }
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Whether `user` owns the collection directly or belongs to its team.
    async fn is_owned_by(&mut self, store: &dyn RecordStore, user: &User) -> ModelResult<bool> {
        let Some(user_id) = user.id() else {
            return Ok(false);
        };
        let id = self.require_id()?;
        let CollectionSlots {
            team, user: owner, ..
        } = self.slots_mut();

        owner.load(store, Self::USER, id).await?;
        if owner.loaded_value().and_then(|owner| owner.id()) == Some(user_id) {
            return Ok(true);
        }

        team.load(store, Self::TEAM, id).await?;
        match team.loaded_value_mut() {
            Some(team) => {
                team.load_users(store).await?;
                team.has_member(user)
            }
            None => Ok(false),
        }
    }
}
