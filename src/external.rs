//! Seams for the services this crate treats as opaque collaborators:
//! identity verification, invite email delivery, photo storage, and shelf
//! photo analysis. Only the contracts live here; real implementations are
//! wired in by the host application.

use futures::future::{ready, BoxFuture};

use crate::model::NewItem;
use crate::AppResult;

#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub user_id: String,
    pub email: Option<String>,
}

/// Exchanges a bearer credential for a verified identity.
/// Failures surface as `AUTH/UNAUTHENTICATED`.
pub trait Identity: Send + Sync {
    fn verify(&self, token: &str) -> BoxFuture<'static, AppResult<VerifiedIdentity>>;
}

#[derive(Debug, Clone)]
pub struct InviteEmail {
    pub to: String,
    pub household_name: String,
    pub code: String,
}

/// Transactional email delivery for household invitations. Fire-and-forget:
/// the invitation record is authoritative whether or not delivery succeeds.
pub trait InviteNotifier: Send + Sync {
    fn send_invite(&self, invite: InviteEmail) -> BoxFuture<'static, AppResult<()>>;
}

/// Swallows every invite; handy default for tests and the CLI.
pub struct NoopNotifier;

impl InviteNotifier for NoopNotifier {
    fn send_invite(&self, _invite: InviteEmail) -> BoxFuture<'static, AppResult<()>> {
        Box::pin(ready(Ok(())))
    }
}

/// Logs the invite instead of delivering it.
pub struct LogNotifier;

impl InviteNotifier for LogNotifier {
    fn send_invite(&self, invite: InviteEmail) -> BoxFuture<'static, AppResult<()>> {
        tracing::info!(
            target = "larder",
            event = "invite_email",
            to = %invite.to,
            household = %invite.household_name,
            code = %invite.code,
        );
        Box::pin(ready(Ok(())))
    }
}

/// Binary object storage for item and container photos.
pub trait ObjectStore: Send + Sync {
    fn put_object(&self, bytes: Vec<u8>) -> BoxFuture<'static, AppResult<String>>;
}

/// One item recognised in a shelf photo.
#[derive(Debug, Clone)]
pub struct DetectedItem {
    pub name: String,
    pub quantity: i64,
    pub category: Option<String>,
}

impl DetectedItem {
    pub fn into_new_item(self) -> NewItem {
        NewItem {
            name: self.name,
            quantity: Some(self.quantity),
            category: self.category,
            ..NewItem::default()
        }
    }
}

/// Opaque image-analysis service; its output feeds ordinary item creation.
pub trait ShelfAnalyzer: Send + Sync {
    fn analyze_shelf(&self, image_urls: Vec<String>)
        -> BoxFuture<'static, AppResult<Vec<DetectedItem>>>;
}
