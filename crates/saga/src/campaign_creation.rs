//! The campaign-creation saga.
//!
//! Five steps, compensated in reverse on failure:
//! 1. `validate_slug`: uniqueness check, nothing to undo
//! 2. `create_campaign_record`: undone by soft-delete
//! 3. `promote_owner_role`: undone by reverting the previous role
//! 4. `initialize_projections`: undone by removing the seeded rows
//! 5. `update_profile_counters`: undone by decrementing

use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{
    CampaignCreatedPayload, DomainPayload, Money, Slug, UserRolePromotedPayload,
};

use crate::registry::SagaDefinition;
use crate::services::{
    CampaignDirectory, CampaignRecord, ProfileCounterService, ProjectionInitializer, RoleService,
};
use crate::step::{SagaContext, SagaStep, StepError, StepOutcome};

/// The saga type identifier for campaign creation.
pub const SAGA_TYPE: &str = "campaign_creation";

/// Step name: check the slug is not already taken.
pub const STEP_VALIDATE_SLUG: &str = "validate_slug";

/// Step name: create the campaign record.
pub const STEP_CREATE_CAMPAIGN: &str = "create_campaign_record";

/// Step name: promote the owner to the campaign-owner role.
pub const STEP_PROMOTE_ROLE: &str = "promote_owner_role";

/// Step name: seed the campaign's read-model rows.
pub const STEP_INIT_PROJECTIONS: &str = "initialize_projections";

/// Step name: bump the owner's profile counters.
pub const STEP_UPDATE_COUNTERS: &str = "update_profile_counters";

/// The role campaign owners hold.
pub const OWNER_ROLE: &str = "campaign_owner";

/// Caller input for starting a campaign-creation saga.
#[derive(Debug, Clone)]
pub struct CampaignCreationInput {
    pub campaign_id: AggregateId,
    pub owner_id: AggregateId,
    pub slug: Slug,
    pub title: String,
    pub goal: Money,
    pub category: String,
}

impl CampaignCreationInput {
    /// Serializes the input into the saga's initial context.
    pub fn context(&self) -> serde_json::Value {
        serde_json::json!({
            "campaign_id": self.campaign_id,
            "owner_id": self.owner_id,
            "slug": self.slug,
            "title": self.title,
            "goal": self.goal,
            "category": self.category,
        })
    }
}

/// Builds the campaign-creation saga definition over the given services.
pub fn definition(
    directory: Arc<dyn CampaignDirectory>,
    roles: Arc<dyn RoleService>,
    projections: Arc<dyn ProjectionInitializer>,
    counters: Arc<dyn ProfileCounterService>,
) -> SagaDefinition {
    SagaDefinition::new(SAGA_TYPE)
        .step(Arc::new(ValidateSlugStep {
            directory: Arc::clone(&directory),
        }))
        .step(Arc::new(CreateCampaignStep { directory }))
        .step(Arc::new(PromoteOwnerRoleStep { roles }))
        .step(Arc::new(InitializeProjectionsStep { projections }))
        .step(Arc::new(UpdateProfileCountersStep { counters }))
}

struct ValidateSlugStep {
    directory: Arc<dyn CampaignDirectory>,
}

#[async_trait]
impl SagaStep for ValidateSlugStep {
    fn name(&self) -> &'static str {
        STEP_VALIDATE_SLUG
    }

    async fn execute(&self, ctx: &SagaContext) -> Result<StepOutcome, StepError> {
        let slug: Slug = ctx.get("slug")?;
        if self.directory.slug_exists(&slug).await? {
            return Err(StepError::new(format!("slug '{slug}' is already taken")));
        }
        Ok(StepOutcome::new())
    }

    fn has_compensation(&self) -> bool {
        false
    }
}

struct CreateCampaignStep {
    directory: Arc<dyn CampaignDirectory>,
}

#[async_trait]
impl SagaStep for CreateCampaignStep {
    fn name(&self) -> &'static str {
        STEP_CREATE_CAMPAIGN
    }

    async fn execute(&self, ctx: &SagaContext) -> Result<StepOutcome, StepError> {
        let campaign_id: AggregateId = ctx.get("campaign_id")?;
        let owner_id: AggregateId = ctx.get("owner_id")?;
        let slug: Slug = ctx.get("slug")?;
        let title: String = ctx.get("title")?;
        let goal: Money = ctx.get("goal")?;
        let category: String = ctx.get("category")?;

        self.directory
            .create(CampaignRecord {
                campaign_id,
                owner_id,
                slug: slug.clone(),
                title: title.clone(),
                goal,
                category: category.clone(),
                deleted: false,
            })
            .await?;

        Ok(StepOutcome::new().with_event(DomainPayload::CampaignCreated(
            CampaignCreatedPayload {
                campaign_id,
                owner_id,
                slug,
                title,
                goal,
                category,
            },
        )))
    }

    async fn compensate(&self, ctx: &SagaContext) -> Result<(), StepError> {
        let campaign_id: AggregateId = ctx.get("campaign_id")?;
        self.directory
            .soft_delete(campaign_id, "campaign creation rolled back")
            .await?;
        Ok(())
    }
}

struct PromoteOwnerRoleStep {
    roles: Arc<dyn RoleService>,
}

#[async_trait]
impl SagaStep for PromoteOwnerRoleStep {
    fn name(&self) -> &'static str {
        STEP_PROMOTE_ROLE
    }

    async fn execute(&self, ctx: &SagaContext) -> Result<StepOutcome, StepError> {
        let owner_id: AggregateId = ctx.get("owner_id")?;
        let previous = self.roles.promote(owner_id, OWNER_ROLE).await?;

        Ok(StepOutcome::new()
            .with_entry("previous_role", serde_json::json!(previous.clone()))
            .with_event(DomainPayload::UserRolePromoted(UserRolePromotedPayload {
                user_id: owner_id,
                from_role: previous,
                to_role: OWNER_ROLE.to_string(),
            })))
    }

    async fn compensate(&self, ctx: &SagaContext) -> Result<(), StepError> {
        let owner_id: AggregateId = ctx.get("owner_id")?;
        let previous_role: String = ctx.get("previous_role")?;
        self.roles.revert(owner_id, &previous_role).await?;
        Ok(())
    }
}

struct InitializeProjectionsStep {
    projections: Arc<dyn ProjectionInitializer>,
}

#[async_trait]
impl SagaStep for InitializeProjectionsStep {
    fn name(&self) -> &'static str {
        STEP_INIT_PROJECTIONS
    }

    async fn execute(&self, ctx: &SagaContext) -> Result<StepOutcome, StepError> {
        let campaign_id: AggregateId = ctx.get("campaign_id")?;
        let owner_id: AggregateId = ctx.get("owner_id")?;
        let title: String = ctx.get("title")?;
        let goal: Money = ctx.get("goal")?;

        self.projections
            .seed_campaign(campaign_id, owner_id, &title, goal)
            .await?;
        Ok(StepOutcome::new())
    }

    async fn compensate(&self, ctx: &SagaContext) -> Result<(), StepError> {
        let campaign_id: AggregateId = ctx.get("campaign_id")?;
        self.projections.remove_campaign(campaign_id).await?;
        Ok(())
    }
}

struct UpdateProfileCountersStep {
    counters: Arc<dyn ProfileCounterService>,
}

#[async_trait]
impl SagaStep for UpdateProfileCountersStep {
    fn name(&self) -> &'static str {
        STEP_UPDATE_COUNTERS
    }

    async fn execute(&self, ctx: &SagaContext) -> Result<StepOutcome, StepError> {
        let owner_id: AggregateId = ctx.get("owner_id")?;
        self.counters.increment_campaigns(owner_id).await?;
        Ok(StepOutcome::new())
    }

    async fn compensate(&self, ctx: &SagaContext) -> Result<(), StepError> {
        let owner_id: AggregateId = ctx.get("owner_id")?;
        self.counters.decrement_campaigns(owner_id).await?;
        Ok(())
    }
}
