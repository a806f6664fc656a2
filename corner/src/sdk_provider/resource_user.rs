use crate::backend::User;
use crate::CornerProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::sdk::{Importer, Meta, Resource, ResourceData, Schema};
use tfplug::types::Diagnostic;

pub struct UserResource;

fn unconfigured() -> Diagnostic {
    Diagnostic::error(
        "Unconfigured client",
        "The provider has not been configured, so no backend client is available",
    )
}

fn user_from(d: &ResourceData) -> User {
    User {
        email: d.get_string("email"),
        name: d.get_string("name"),
        age: d.get_int("age"),
        date_joined: String::new(),
        language: d.get_string("language"),
    }
}

fn set_user(d: &mut ResourceData, user: User) -> tfplug::Result<()> {
    d.set("email", user.email)?;
    d.set("name", user.name)?;
    d.set("age", user.age)?;
    d.set("date_joined", user.date_joined)?;
    d.set("language", user.language)?;
    Ok(())
}

#[async_trait]
impl Resource for UserResource {
    fn schema(&self) -> HashMap<String, Schema> {
        HashMap::from([
            (
                "email".to_string(),
                Schema::string().required().force_new(),
            ),
            ("name".to_string(), Schema::string().required()),
            ("age".to_string(), Schema::int().required()),
            ("language".to_string(), Schema::string().optional().computed()),
            ("date_joined".to_string(), Schema::string().computed()),
            (
                "with_default".to_string(),
                Schema::string()
                    .optional()
                    .default("example")
                    .description("Never sent to the backend; only exercises schema defaults"),
            ),
        ])
    }

    fn description(&self) -> &str {
        "A user of the fake backend, identified by email"
    }

    fn importer(&self) -> Option<Importer> {
        Some(Importer::Passthrough)
    }

    async fn create(&self, ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic> {
        let Some(provider_data) = meta.downcast_ref::<CornerProviderData>() else {
            return vec![unconfigured()];
        };

        let user = user_from(d);
        if let Err(e) = provider_data.client.create_user(&user).await {
            return vec![Diagnostic::error("Error creating user", e.to_string())];
        }
        d.set_id(user.email);

        self.read(ctx, d, meta).await
    }

    async fn read(&self, _ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic> {
        let Some(provider_data) = meta.downcast_ref::<CornerProviderData>() else {
            return vec![unconfigured()];
        };

        match provider_data.client.read_user(d.id()).await {
            Ok(Some(user)) => match set_user(d, user) {
                Ok(()) => vec![],
                Err(e) => vec![Diagnostic::error("Error setting user attributes", e.to_string())],
            },
            Ok(None) => {
                tracing::warn!("User {} not found, removing from state", d.id());
                d.set_id("");
                vec![]
            }
            Err(e) => vec![Diagnostic::error("Error reading user", e.to_string())],
        }
    }

    async fn update(&self, ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic> {
        let Some(provider_data) = meta.downcast_ref::<CornerProviderData>() else {
            return vec![unconfigured()];
        };

        if let Err(e) = provider_data.client.update_user(&user_from(d)).await {
            return vec![Diagnostic::error("Error updating user", e.to_string())];
        }

        self.read(ctx, d, meta).await
    }

    async fn delete(&self, _ctx: Context, d: &mut ResourceData, meta: &Meta) -> Vec<Diagnostic> {
        let Some(provider_data) = meta.downcast_ref::<CornerProviderData>() else {
            return vec![unconfigured()];
        };

        match provider_data.client.delete_user(d.id()).await {
            Ok(()) => vec![],
            Err(e) => vec![Diagnostic::error("Error deleting user", e.to_string())],
        }
    }
}
