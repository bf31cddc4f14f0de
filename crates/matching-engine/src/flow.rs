//! Match notification flow
//!
//! Decides, per page context, when a match notification is shown and what
//! the user's "close" and "don't show again" choices do to persisted state.
//!
//! ```text
//! Idle -> Checking -> Showing -> Dismissed
//!                            \-> DismissedPermanently
//! ```
//!
//! Everything here is best-effort: failures degrade to "no notification" and
//! never block the page.

use common::types::UserIdentity;
use observability::MatchingMetrics;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::domain::{Matches, RequirementCriteria, VehicleCriteria, VehicleListing};
use crate::engine::MatchingEngine;
use crate::persistence::{MatchSignature, PendingMatchPersistence};
use crate::scheduler::{schedule_after, ScheduledTask};

/// Page a flow instance belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageContext {
    Home,
    Dashboard,
    /// Vehicle posting form
    VehiclePost,
    /// Requirement posting form
    RequirementForm,
}

impl PageContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageContext::Home => "home",
            PageContext::Dashboard => "dashboard",
            PageContext::VehiclePost => "vehicle_post",
            PageContext::RequirementForm => "requirement_form",
        }
    }

    /// Only landing pages re-check a pending match on load
    pub fn runs_pending_recheck(&self) -> bool {
        matches!(self, PageContext::Home | PageContext::Dashboard)
    }
}

/// What raised a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOrigin {
    VehiclePosted,
    RequirementPosted,
    PendingRecheck,
}

/// A notification currently on screen
#[derive(Debug, Clone, PartialEq)]
pub struct MatchNotification {
    pub origin: NotificationOrigin,
    /// Identity used for "don't show again"
    pub signature: MatchSignature,
    pub matches: Matches,
}

/// Observable state of a flow
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FlowState {
    #[default]
    Idle,
    Checking,
    Showing(MatchNotification),
    /// Closed for this page lifetime
    Dismissed,
    /// Closed for good for this signature
    DismissedPermanently,
}

impl FlowState {
    pub fn is_showing(&self) -> bool {
        matches!(self, FlowState::Showing(_))
    }
}

/// Result of checking matches after a requirement is posted
#[derive(Debug, Clone, PartialEq)]
pub enum RequirementPostOutcome {
    /// Show these listings; the form stays open behind the notification
    ShowMatches(Vec<VehicleListing>),
    /// Nothing to show; close the form after the success acknowledgement
    CloseForm,
}

/// Users whose pending match was already re-checked this session
///
/// Shared by every page context of one session.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    checked: Arc<Mutex<HashSet<String>>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `user_id` as checked; false if it already was
    pub fn mark(&self, user_id: &str) -> bool {
        self.checked.lock().insert(user_id.to_string())
    }

    pub fn has_checked(&self, user_id: &str) -> bool {
        self.checked.lock().contains(user_id)
    }

    /// Forget the user, e.g. on sign-out
    pub fn reset(&self, user_id: &str) {
        self.checked.lock().remove(user_id);
    }
}

struct FlowInner {
    context: PageContext,
    engine: MatchingEngine,
    persistence: PendingMatchPersistence,
    session: SessionTracker,
    recheck_delay: Duration,
    state: watch::Sender<FlowState>,
    /// Vehicle match shown after posting and not dismissed permanently
    unresolved: Mutex<Option<VehicleCriteria>>,
    disposed: AtomicBool,
    metrics: MatchingMetrics,
}

impl FlowInner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: FlowState) {
        if !self.is_disposed() {
            self.state.send_replace(state);
        }
    }

    fn show(&self, notification: MatchNotification) {
        info!(
            context = self.context.as_str(),
            origin = ?notification.origin,
            matches = notification.matches.len(),
            "Showing match notification"
        );
        self.metrics.record_notification_shown(self.context.as_str());
        self.set_state(FlowState::Showing(notification));
    }

    async fn recheck_pending(&self, user: &UserIdentity) -> bool {
        let Some(pending) = self.persistence.get_pending_vehicle_match() else {
            debug!(user_id = %user.id, "No pending match to re-check");
            return false;
        };

        let signature = MatchSignature::from(&pending);
        if self.persistence.is_dismissed(&user.id, &signature) {
            info!(user_id = %user.id, "Pending match was dismissed, clearing");
            self.persistence.clear_pending_vehicle_match();
            return false;
        }

        self.set_state(FlowState::Checking);
        let found = self.engine.check_partial_matches(&pending).await;
        if self.is_disposed() {
            return false;
        }

        if found.is_empty() {
            info!(
                make = %pending.make,
                model = %pending.model,
                "Pending match no longer has matches, clearing"
            );
            self.persistence.clear_pending_vehicle_match();
            self.set_state(FlowState::Idle);
            return false;
        }

        self.show(MatchNotification {
            origin: NotificationOrigin::PendingRecheck,
            signature,
            matches: Matches::Requirements(found),
        });
        true
    }
}

/// Notification flow for one page context
pub struct MatchNotificationFlow {
    inner: Arc<FlowInner>,
    timer: Mutex<Option<ScheduledTask>>,
}

impl MatchNotificationFlow {
    pub fn new(
        context: PageContext,
        engine: MatchingEngine,
        persistence: PendingMatchPersistence,
        session: SessionTracker,
        recheck_delay: Duration,
    ) -> Self {
        let (state, _) = watch::channel(FlowState::Idle);
        Self {
            inner: Arc::new(FlowInner {
                context,
                engine,
                persistence,
                session,
                recheck_delay,
                state,
                unresolved: Mutex::new(None),
                disposed: AtomicBool::new(false),
                metrics: MatchingMetrics::new(),
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn context(&self) -> PageContext {
        self.inner.context
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.inner.engine
    }

    pub fn state(&self) -> FlowState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.inner.state.subscribe()
    }

    // ========================================================================
    // Triggers
    // ========================================================================

    /// Check for buyers right after a vehicle is posted. True if shown.
    pub async fn after_vehicle_posted(
        &self,
        user: &UserIdentity,
        vehicle: &VehicleCriteria,
    ) -> bool {
        let inner = &self.inner;
        inner.set_state(FlowState::Checking);

        let found = inner.engine.check_vehicle_matches(vehicle).await;
        if inner.is_disposed() {
            return false;
        }
        if found.is_empty() {
            debug!(make = %vehicle.make, model = %vehicle.model, "No buyers for posted vehicle");
            inner.set_state(FlowState::Idle);
            return false;
        }

        let signature = MatchSignature::from(vehicle);
        if inner.persistence.is_dismissed(&user.id, &signature) {
            debug!(user_id = %user.id, "Vehicle matches dismissed earlier, not showing");
            inner.set_state(FlowState::Idle);
            return false;
        }

        *inner.unresolved.lock() = Some(vehicle.clone());
        inner.show(MatchNotification {
            origin: NotificationOrigin::VehiclePosted,
            signature,
            matches: Matches::Requirements(found),
        });
        true
    }

    /// Check for listings right after a requirement is posted
    pub async fn after_requirement_posted(
        &self,
        user: &UserIdentity,
        requirement: &RequirementCriteria,
    ) -> RequirementPostOutcome {
        let inner = &self.inner;
        inner.set_state(FlowState::Checking);

        let found = inner.engine.check_requirement_matches(requirement).await;
        if inner.is_disposed() {
            return RequirementPostOutcome::CloseForm;
        }
        if found.is_empty() {
            inner.set_state(FlowState::Idle);
            return RequirementPostOutcome::CloseForm;
        }

        let signature = MatchSignature::from(requirement);
        if inner.persistence.is_dismissed(&user.id, &signature) {
            debug!(user_id = %user.id, "Requirement matches dismissed earlier, not showing");
            inner.set_state(FlowState::Idle);
            return RequirementPostOutcome::CloseForm;
        }

        inner.show(MatchNotification {
            origin: NotificationOrigin::RequirementPosted,
            signature,
            matches: Matches::Listings(found.clone()),
        });
        RequirementPostOutcome::ShowMatches(found)
    }

    /// Page load: schedule the pending-match re-check after the configured
    /// delay. Runs at most once per user per session, and only on landing
    /// pages. True if a re-check was scheduled.
    pub fn start(&self, user: &UserIdentity) -> bool {
        let inner = &self.inner;
        if !inner.context.runs_pending_recheck() || inner.is_disposed() {
            return false;
        }
        if inner.session.has_checked(&user.id) {
            debug!(user_id = %user.id, "Pending match already re-checked this session");
            return false;
        }

        let mut timer = self.timer.lock();
        if timer.is_some() {
            return false;
        }

        let task_inner = Arc::clone(inner);
        let user = user.clone();
        *timer = Some(schedule_after(inner.recheck_delay, async move {
            if task_inner.session.mark(&user.id) {
                task_inner.recheck_pending(&user).await;
            }
        }));

        debug!(
            context = inner.context.as_str(),
            delay_ms = inner.recheck_delay.as_millis() as u64,
            "Pending match re-check scheduled"
        );
        true
    }

    /// Wait for the re-check scheduled by [`start`](Self::start) to end.
    ///
    /// The caller takes over the timer: `dispose` no longer cancels it.
    /// True if the re-check body ran.
    pub async fn wait_recheck(&self) -> bool {
        let timer = self.timer.lock().take();
        match timer {
            Some(mut timer) => timer.join().await,
            None => false,
        }
    }

    /// The re-check body, without the delay or session bookkeeping
    pub async fn recheck_pending(&self, user: &UserIdentity) -> bool {
        self.inner.recheck_pending(user).await
    }

    // ========================================================================
    // User choices
    // ========================================================================

    /// Close the notification for this page lifetime only
    pub fn close(&self) -> bool {
        if !self.inner.state.borrow().is_showing() {
            return false;
        }
        self.inner.metrics.record_dismissal(false);
        self.inner.set_state(FlowState::Dismissed);
        true
    }

    /// Never show this notification's signature to `user` again
    pub fn dont_show_again(&self, user: &UserIdentity) -> bool {
        let inner = &self.inner;
        let signature = match &*inner.state.borrow() {
            FlowState::Showing(notification) => notification.signature.clone(),
            _ => return false,
        };

        inner.persistence.set_dismissed(&user.id, &signature);
        if let MatchSignature::Vehicle(criteria) = &signature {
            if inner.persistence.get_pending_vehicle_match().as_ref() == Some(criteria) {
                inner.persistence.clear_pending_vehicle_match();
            }
            let mut unresolved = inner.unresolved.lock();
            if unresolved.as_ref() == Some(criteria) {
                *unresolved = None;
            }
        }

        inner.metrics.record_dismissal(true);
        inner.set_state(FlowState::DismissedPermanently);
        true
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Tear down the page context.
    ///
    /// Cancels the re-check timer, saves an unresolved posted-vehicle match
    /// into the pending slot, and discards any in-flight engine result.
    pub fn dispose(&self) {
        let inner = &self.inner;
        if inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(timer) = self.timer.lock().take() {
            timer.cancel();
        }
        if let Some(vehicle) = inner.unresolved.lock().take() {
            inner.persistence.set_pending_vehicle_match(&vehicle);
        }
        inner.engine.dispose();

        debug!(context = inner.context.as_str(), "Match notification flow disposed");
    }
}

impl Drop for MatchNotificationFlow {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ListingStatus, Requirement, VehicleType};
    use crate::persistence::{InMemoryKeyValueStore, KeyValueStore, PENDING_VEHICLE_MATCH_KEY};
    use crate::store::InMemoryMarketplaceStore;
    use assert_matches::assert_matches;

    struct Harness {
        store: Arc<InMemoryMarketplaceStore>,
        profile: Arc<InMemoryKeyValueStore>,
        session: SessionTracker,
    }

    impl Harness {
        fn new(requirements: Vec<Requirement>, listings: Vec<VehicleListing>) -> Self {
            Self {
                store: Arc::new(InMemoryMarketplaceStore::seeded(listings, requirements)),
                profile: Arc::new(InMemoryKeyValueStore::new()),
                session: SessionTracker::new(),
            }
        }

        fn persistence(&self) -> PendingMatchPersistence {
            PendingMatchPersistence::new(self.profile.clone())
        }

        fn flow(&self, context: PageContext) -> MatchNotificationFlow {
            MatchNotificationFlow::new(
                context,
                MatchingEngine::new(self.store.clone()),
                self.persistence(),
                self.session.clone(),
                Duration::from_secs(5),
            )
        }
    }

    fn user() -> UserIdentity {
        UserIdentity::new("user-1", "seller@example.com")
    }

    fn innova() -> VehicleCriteria {
        VehicleCriteria::new(VehicleType::Car, "Toyota", "Innova", 2021)
    }

    fn buyer(make: &str, model: &str) -> Requirement {
        Requirement::new(VehicleType::Car, "buyer")
            .with_make(make)
            .with_model(model)
    }

    #[tokio::test]
    async fn test_vehicle_post_shows_and_close_persists_on_dispose() {
        let req = buyer("Toyota", "Innova");
        let id = req.id;
        let h = Harness::new(vec![req], Vec::new());
        let flow = h.flow(PageContext::VehiclePost);

        assert!(flow.after_vehicle_posted(&user(), &innova()).await);
        assert_matches!(
            flow.state(),
            FlowState::Showing(MatchNotification { origin: NotificationOrigin::VehiclePosted, ref matches, .. })
                if matches.ids() == vec![id]
        );

        assert!(flow.close());
        assert_eq!(flow.state(), FlowState::Dismissed);
        assert_eq!(h.persistence().get_pending_vehicle_match(), None);

        drop(flow);
        assert_eq!(h.persistence().get_pending_vehicle_match(), Some(innova()));
    }

    #[tokio::test]
    async fn test_vehicle_post_without_matches_stays_idle() {
        let h = Harness::new(vec![buyer("Honda", "City")], Vec::new());
        let flow = h.flow(PageContext::VehiclePost);

        assert!(!flow.after_vehicle_posted(&user(), &innova()).await);
        assert_eq!(flow.state(), FlowState::Idle);
        assert!(!flow.close());

        flow.dispose();
        assert!(h.profile.is_empty());
    }

    #[tokio::test]
    async fn test_dont_show_again_after_vehicle_post() {
        let h = Harness::new(vec![buyer("Toyota", "Innova")], Vec::new());
        let flow = h.flow(PageContext::VehiclePost);
        h.persistence().set_pending_vehicle_match(&innova());

        flow.after_vehicle_posted(&user(), &innova()).await;
        assert!(flow.dont_show_again(&user()));
        assert_eq!(flow.state(), FlowState::DismissedPermanently);

        let persistence = h.persistence();
        assert!(persistence.is_dismissed("user-1", &MatchSignature::from(&innova())));
        assert_eq!(persistence.get_pending_vehicle_match(), None);

        flow.dispose();
        assert_eq!(persistence.get_pending_vehicle_match(), None);
    }

    #[tokio::test]
    async fn test_dont_show_again_leaves_unrelated_pending_slot() {
        let h = Harness::new(vec![buyer("Toyota", "Innova")], Vec::new());
        let swift = VehicleCriteria::new(VehicleType::Car, "Maruti", "Swift", 2019);
        h.persistence().set_pending_vehicle_match(&swift);

        let flow = h.flow(PageContext::VehiclePost);
        flow.after_vehicle_posted(&user(), &innova()).await;
        flow.dont_show_again(&user());

        assert_eq!(h.persistence().get_pending_vehicle_match(), Some(swift));
    }

    #[tokio::test]
    async fn test_requirement_post_outcomes() {
        let city = VehicleListing::new(VehicleType::Car, "Honda", "City", 2020, 800_000, "s")
            .with_status(ListingStatus::Active);
        let h = Harness::new(Vec::new(), vec![city.clone()]);
        let flow = h.flow(PageContext::RequirementForm);

        let wants_honda = RequirementCriteria::new(VehicleType::Car).with_make("hon");
        assert_eq!(
            flow.after_requirement_posted(&user(), &wants_honda).await,
            RequirementPostOutcome::ShowMatches(vec![city])
        );
        assert!(flow.state().is_showing());

        let wants_bike = RequirementCriteria::new(VehicleType::Bike);
        assert_eq!(
            flow.after_requirement_posted(&user(), &wants_bike).await,
            RequirementPostOutcome::CloseForm
        );
        assert_eq!(flow.state(), FlowState::Idle);
    }

    #[tokio::test]
    async fn test_requirement_dismissal_suppresses_notification() {
        let city = VehicleListing::new(VehicleType::Car, "Honda", "City", 2020, 800_000, "s")
            .with_status(ListingStatus::Active);
        let h = Harness::new(Vec::new(), vec![city]);
        let flow = h.flow(PageContext::RequirementForm);
        let wants_honda = RequirementCriteria::new(VehicleType::Car).with_make("Honda");

        flow.after_requirement_posted(&user(), &wants_honda).await;
        assert!(flow.dont_show_again(&user()));

        assert_eq!(
            flow.after_requirement_posted(&user(), &wants_honda).await,
            RequirementPostOutcome::CloseForm
        );
        // no vehicle dismissal, so the pending slot is never touched
        assert!(h.profile.get_item(PENDING_VEHICLE_MATCH_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_vehicle_dismissal_survives_new_page_context() {
        let h = Harness::new(vec![buyer("Toyota", "Innova")], Vec::new());

        let first = h.flow(PageContext::VehiclePost);
        assert!(first.after_vehicle_posted(&user(), &innova()).await);
        assert!(first.dont_show_again(&user()));
        drop(first);

        let second = h.flow(PageContext::VehiclePost);
        assert!(!second.after_vehicle_posted(&user(), &innova()).await);
        assert_eq!(second.state(), FlowState::Idle);

        drop(second);
        assert_eq!(h.persistence().get_pending_vehicle_match(), None);

        // another user still sees the same vehicle's buyers
        let other = UserIdentity::new("user-2", "other@example.com");
        let third = h.flow(PageContext::VehiclePost);
        assert!(third.after_vehicle_posted(&other, &innova()).await);
    }

    #[tokio::test]
    async fn test_dont_show_again_on_pending_recheck() {
        let h = Harness::new(vec![buyer("Toyota", "Fortuner")], Vec::new());
        h.persistence().set_pending_vehicle_match(&innova());

        let flow = h.flow(PageContext::Dashboard);
        assert!(flow.recheck_pending(&user()).await);
        assert_matches!(
            flow.state(),
            FlowState::Showing(MatchNotification { origin: NotificationOrigin::PendingRecheck, .. })
        );

        assert!(flow.dont_show_again(&user()));
        assert_eq!(flow.state(), FlowState::DismissedPermanently);

        let persistence = h.persistence();
        assert!(persistence.is_dismissed("user-1", &MatchSignature::from(&innova())));
        assert_eq!(persistence.get_pending_vehicle_match(), None);

        drop(flow);
        assert_eq!(persistence.get_pending_vehicle_match(), None);
        let home = h.flow(PageContext::Home);
        assert!(!home.recheck_pending(&user()).await);
    }

    #[tokio::test]
    async fn test_recheck_uses_partial_fallback() {
        let fortuner = buyer("Toyota", "Fortuner");
        let id = fortuner.id;
        let h = Harness::new(vec![fortuner], Vec::new());
        h.persistence().set_pending_vehicle_match(&innova());

        let flow = h.flow(PageContext::Dashboard);
        assert!(flow.recheck_pending(&user()).await);
        assert_matches!(
            flow.state(),
            FlowState::Showing(MatchNotification { origin: NotificationOrigin::PendingRecheck, ref matches, .. })
                if matches.ids() == vec![id]
        );
        assert_eq!(h.persistence().get_pending_vehicle_match(), Some(innova()));
    }

    #[tokio::test]
    async fn test_recheck_clears_when_no_matches_remain() {
        let h = Harness::new(vec![buyer("Honda", "City")], Vec::new());
        h.persistence().set_pending_vehicle_match(&innova());

        let flow = h.flow(PageContext::Home);
        assert!(!flow.recheck_pending(&user()).await);
        assert_eq!(flow.state(), FlowState::Idle);
        assert_eq!(h.persistence().get_pending_vehicle_match(), None);
    }

    #[tokio::test]
    async fn test_recheck_clears_dismissed_without_querying() {
        let h = Harness::new(vec![buyer("Toyota", "Innova")], Vec::new());
        let persistence = h.persistence();
        persistence.set_pending_vehicle_match(&innova());
        persistence.set_dismissed("user-1", &MatchSignature::from(&innova()));

        let flow = h.flow(PageContext::Home);
        assert!(!flow.recheck_pending(&user()).await);
        assert_eq!(persistence.get_pending_vehicle_match(), None);
        assert_eq!(flow.engine().stats().queries_issued, 0);
    }

    #[tokio::test]
    async fn test_recheck_without_pending_does_nothing() {
        let h = Harness::new(vec![buyer("Toyota", "Innova")], Vec::new());
        let flow = h.flow(PageContext::Home);
        assert!(!flow.recheck_pending(&user()).await);
        assert_eq!(flow.state(), FlowState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rechecks_after_delay_once_per_session() {
        let h = Harness::new(vec![buyer("Toyota", "Innova")], Vec::new());
        h.persistence().set_pending_vehicle_match(&innova());

        let home = h.flow(PageContext::Home);
        let mut states = home.subscribe();
        assert!(home.start(&user()));
        assert!(!home.start(&user()));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(home.state(), FlowState::Idle);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(home.state().is_showing());
        assert!(states.has_changed().unwrap());
        assert!(states.borrow_and_update().is_showing());

        let dashboard = h.flow(PageContext::Dashboard);
        assert!(!dashboard.start(&user()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_cancels_pending_recheck() {
        let h = Harness::new(vec![buyer("Honda", "City")], Vec::new());
        h.persistence().set_pending_vehicle_match(&innova());

        let home = h.flow(PageContext::Home);
        assert!(home.start(&user()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        home.dispose();

        tokio::time::sleep(Duration::from_secs(10)).await;
        // the re-check never ran, so the stale slot was not cleared
        assert_eq!(h.persistence().get_pending_vehicle_match(), Some(innova()));
        assert!(!h.session.has_checked("user-1"));
        assert!(!home.start(&user()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_recheck() {
        let h = Harness::new(vec![buyer("Toyota", "Fortuner")], Vec::new());
        h.persistence().set_pending_vehicle_match(&innova());

        let home = h.flow(PageContext::Home);
        assert!(!home.wait_recheck().await);
        assert!(home.start(&user()));
        assert!(home.wait_recheck().await);
        assert!(home.state().is_showing());
        assert!(h.session.has_checked("user-1"));
    }

    #[test]
    fn test_start_only_on_landing_pages() {
        let h = Harness::new(Vec::new(), Vec::new());
        let flow = h.flow(PageContext::VehiclePost);
        assert!(!flow.start(&user()));
        assert!(!h.flow(PageContext::RequirementForm).start(&user()));
    }

    #[test]
    fn test_session_tracker() {
        let session = SessionTracker::new();
        assert!(session.mark("u"));
        assert!(!session.mark("u"));
        assert!(session.has_checked("u"));
        session.reset("u");
        assert!(!session.has_checked("u"));
    }
}
