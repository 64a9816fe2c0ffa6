//! Result submission, verification, editing and sharing.
//!
//! T019: Submission with inline scoring
//! T024: Two-party verification with a one-shot confirmation lock

use crate::collaborators::notifier::{NotificationEvent, NotificationSink};
use crate::collaborators::FeedPublisher;
use crate::curves::cache::CurveCache;
use crate::curves::types::{CurveError, Gender};
use crate::results::types::{
    Origin, ShareReason, SubmitRequest, UserTestResult, VerificationDecision,
};
use crate::scoring::{classify, normalize};
use crate::snapshot::service::{SnapshotError, SnapshotService};
use crate::storage::database::Database;
use crate::storage::DatabaseError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Orchestrates the lifecycle of a measurement: score it on the way in,
/// guard the verification handshake, keep the snapshot in step.
pub struct ResultService {
    db: Arc<Database>,
    curves: Arc<CurveCache>,
    snapshots: Arc<SnapshotService>,
    notifier: Arc<dyn NotificationSink>,
    feed: Arc<dyn FeedPublisher>,
}

impl ResultService {
    pub fn new(
        db: Arc<Database>,
        curves: Arc<CurveCache>,
        snapshots: Arc<SnapshotService>,
        notifier: Arc<dyn NotificationSink>,
        feed: Arc<dyn FeedPublisher>,
    ) -> Self {
        Self {
            db,
            curves,
            snapshots,
            notifier,
            feed,
        }
    }

    /// Record a measurement and score it against the reference curve.
    ///
    /// Athlete submissions start unverified; naming a controller kicks off
    /// the verification handshake. Coach submissions are verified on entry
    /// and immediately roll the athlete's snapshot forward.
    pub fn submit(&self, req: SubmitRequest) -> Result<UserTestResult, ResultError> {
        let test = self
            .db
            .get_test(&req.test_id)?
            .filter(|t| !t.is_deleted)
            .ok_or(ResultError::TestNotFound(req.test_id))?;

        // Nobody verifies their own result, whichever side they are on.
        let (controller_id, verified_on_entry) = match req.origin {
            Origin::Athlete { controller_id } => {
                if controller_id == Some(req.user_id) {
                    return Err(ResultError::SelfVerification);
                }
                (controller_id, false)
            }
            Origin::Coach { coach_id } => {
                if coach_id == req.user_id {
                    return Err(ResultError::SelfVerification);
                }
                (Some(coach_id), true)
            }
        };

        let curve = self.curves.get(&test.test_name, req.gender)?;
        let point = normalize(&curve, req.value, req.body_weight)?;
        let level = classify(point);

        let now = Utc::now();
        let result = UserTestResult {
            id: Uuid::new_v4(),
            subtype_id: test.subtype_id,
            test_id: test.id,
            user_id: req.user_id,
            controller_id,
            value: req.value,
            metric: test.metric.clone(),
            point,
            level,
            executed_at: req.executed_at,
            is_public: req.is_public,
            is_verified: verified_on_entry,
            is_confirmed: verified_on_entry,
            is_deleted: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.db.insert_result(&result)?;

        tracing::info!(
            result = %result.id,
            user = %result.user_id,
            test = %test.test_name,
            point,
            "result recorded"
        );

        match req.origin {
            Origin::Coach { coach_id } => {
                if let Some(category) = self.db.test_category(&test.id)? {
                    self.snapshots
                        .rollup(&result.user_id, category, now)?;
                }
                self.notifier.notify(NotificationEvent::CoachResultRecorded {
                    result_id: result.id,
                    athlete_id: result.user_id,
                    coach_id,
                });
            }
            Origin::Athlete {
                controller_id: Some(controller_id),
            } => {
                self.notifier.notify(NotificationEvent::VerificationRequested {
                    result_id: result.id,
                    athlete_id: result.user_id,
                    controller_id,
                });
            }
            Origin::Athlete { controller_id: None } => {}
        }

        Ok(result)
    }

    /// Accept or reject a result as its designated controller.
    ///
    /// The decision is final either way; the confirmation lock is taken with
    /// a conditional update so racing decisions cannot both land.
    pub fn verify(
        &self,
        result_id: &Uuid,
        controller_id: &Uuid,
        decision: VerificationDecision,
    ) -> Result<UserTestResult, ResultError> {
        let result = self
            .db
            .get_result(result_id)?
            .filter(|r| !r.is_deleted)
            .ok_or(ResultError::NotFound(*result_id))?;

        if result.controller_id != Some(*controller_id) {
            return Err(ResultError::NotController);
        }
        if result.is_confirmed {
            return Err(ResultError::AlreadyConfirmed);
        }

        let verified = decision == VerificationDecision::Verified;
        let now = Utc::now();
        let rows = self.db.confirm_result(result_id, verified, now)?;
        if rows == 0 {
            // Lost the race to another decision.
            return Err(ResultError::AlreadyConfirmed);
        }

        let updated = self
            .db
            .get_result(result_id)?
            .ok_or(ResultError::NotFound(*result_id))?;

        if verified {
            if let Some(category) = self.db.test_category(&updated.test_id)? {
                self.snapshots.rollup(&updated.user_id, category, now)?;
            }
            self.notifier.notify(NotificationEvent::ResultVerified {
                result_id: updated.id,
                athlete_id: updated.user_id,
                controller_id: *controller_id,
            });
        } else {
            self.notifier.notify(NotificationEvent::ResultRejected {
                result_id: updated.id,
                athlete_id: updated.user_id,
                controller_id: *controller_id,
            });
        }

        tracing::info!(
            result = %updated.id,
            verified,
            "verification decision recorded"
        );
        Ok(updated)
    }

    /// Rewrite an unverified result's measurement; score and tier are
    /// recomputed from the current curve.
    pub fn update(
        &self,
        result_id: &Uuid,
        requester_id: &Uuid,
        value: f64,
        body_weight: Option<f64>,
        gender: Gender,
        executed_at: DateTime<Utc>,
    ) -> Result<UserTestResult, ResultError> {
        let result = self
            .db
            .get_result(result_id)?
            .filter(|r| !r.is_deleted)
            .ok_or(ResultError::NotFound(*result_id))?;

        if result.user_id != *requester_id {
            return Err(ResultError::NotOwner);
        }
        if result.is_verified {
            return Err(ResultError::CannotUpdateVerified);
        }

        let test = self
            .db
            .get_test(&result.test_id)?
            .ok_or(ResultError::TestNotFound(result.test_id))?;

        let curve = self.curves.get(&test.test_name, gender)?;
        let point = normalize(&curve, value, body_weight)?;
        let level = classify(point);

        self.db
            .update_result_measurement(result_id, value, point, level, executed_at, Utc::now())?;

        self.db
            .get_result(result_id)?
            .ok_or(ResultError::NotFound(*result_id))
    }

    /// Soft-delete a result. Verified results are immutable history and
    /// cannot be removed.
    pub fn delete(&self, result_id: &Uuid, requester_id: &Uuid) -> Result<(), ResultError> {
        let result = self
            .db
            .get_result(result_id)?
            .filter(|r| !r.is_deleted)
            .ok_or(ResultError::NotFound(*result_id))?;

        if result.user_id != *requester_id {
            return Err(ResultError::NotOwner);
        }
        if result.is_verified {
            return Err(ResultError::CannotDeleteVerified);
        }

        self.db.soft_delete_result(result_id, Utc::now())?;
        Ok(())
    }

    /// Publish an owned, public, verified result to the platform feed.
    pub fn share(&self, result_id: &Uuid, requester_id: &Uuid) -> Result<(), ResultError> {
        let result = self
            .db
            .get_result(result_id)?
            .filter(|r| !r.is_deleted)
            .ok_or(ResultError::NotFound(*result_id))?;

        if result.user_id != *requester_id {
            return Err(ResultError::NotShareable(ShareReason::NotOwner));
        }
        if !result.is_public {
            return Err(ResultError::NotShareable(ShareReason::Private));
        }
        if !result.is_verified {
            return Err(ResultError::NotShareable(ShareReason::Unverified));
        }

        let category = self
            .db
            .test_category(&result.test_id)?
            .ok_or(ResultError::TestNotFound(result.test_id))?;
        self.feed.publish(&result, category);

        Ok(())
    }

    /// A single result.
    pub fn get(&self, result_id: &Uuid) -> Result<UserTestResult, ResultError> {
        self.db
            .get_result(result_id)?
            .filter(|r| !r.is_deleted)
            .ok_or(ResultError::NotFound(*result_id))
    }
}

/// Result workflow errors.
#[derive(Debug, Error)]
pub enum ResultError {
    #[error("Result {0} not found")]
    NotFound(Uuid),

    #[error("Test {0} not found")]
    TestNotFound(Uuid),

    #[error("A result cannot be verified by its own athlete")]
    SelfVerification,

    #[error("Requester is not the designated controller")]
    NotController,

    #[error("Verification decision was already recorded")]
    AlreadyConfirmed,

    #[error("Verified results cannot be updated")]
    CannotUpdateVerified,

    #[error("Verified results cannot be deleted")]
    CannotDeleteVerified,

    #[error("Requester does not own the result")]
    NotOwner,

    #[error("Result cannot be shared: {0}")]
    NotShareable(ShareReason),

    #[error(transparent)]
    Curve(#[from] CurveError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ResultError {
    /// Stable machine-readable code for transport-layer mapping.
    pub fn code(&self) -> &'static str {
        match self {
            ResultError::NotFound(_) => "RESULT_NOT_FOUND",
            ResultError::TestNotFound(_) => "RESULT_TEST_NOT_FOUND",
            ResultError::SelfVerification => "RESULT_SELF_VERIFICATION",
            ResultError::NotController => "RESULT_NOT_CONTROLLER",
            ResultError::AlreadyConfirmed => "RESULT_ALREADY_CONFIRMED",
            ResultError::CannotUpdateVerified => "RESULT_UPDATE_VERIFIED",
            ResultError::CannotDeleteVerified => "RESULT_DELETE_VERIFIED",
            ResultError::NotOwner => "RESULT_NOT_OWNER",
            ResultError::NotShareable(ShareReason::NotOwner) => "SHARE_NOT_OWNER",
            ResultError::NotShareable(ShareReason::Private) => "SHARE_PRIVATE",
            ResultError::NotShareable(ShareReason::Unverified) => "SHARE_UNVERIFIED",
            ResultError::Curve(e) => e.code(),
            ResultError::Snapshot(e) => e.code(),
            ResultError::Database(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::service::{CatalogService, NewTest};
    use crate::catalog::types::TestCategory;
    use crate::collaborators::notifier::ChannelNotifier;
    use crate::collaborators::NullFeed;
    use crate::curves::store::SqliteCurveStore;
    use crate::curves::types::{CurveTable, Gender};
    use crate::scoring::Level;
    use crossbeam::channel::Receiver;

    struct Fixture {
        service: ResultService,
        events: Receiver<NotificationEvent>,
        test_id: Uuid,
        subtype_id: Uuid,
        db: Arc<Database>,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Arc::new(SqliteCurveStore::new(db.clone()));
        let curves = Arc::new(CurveCache::new(store));
        let catalog = CatalogService::new(db.clone(), curves.clone());

        let subtype = catalog
            .create_subtype(TestCategory::Physical, "Sprinting", None)
            .unwrap();
        let test = catalog
            .add_test(
                &subtype.id,
                NewTest {
                    test_name: "40m Sprint".to_string(),
                    media: None,
                    description: None,
                    table_description: None,
                    references: Vec::new(),
                    tables: vec![CurveTable {
                        gender: Gender::Male,
                        rows: vec![
                            Some("40m Sprint".to_string()),
                            Some("sec".to_string()),
                            Some(">".to_string()),
                            Some("5.0".to_string()),
                            Some("5.5".to_string()),
                            Some("6.0".to_string()),
                        ],
                        index_column: vec![90.0, 70.0, 40.0],
                    }],
                },
            )
            .unwrap();

        let (notifier, events) = ChannelNotifier::new();
        let snapshots = Arc::new(SnapshotService::new(db.clone()));
        let service = ResultService::new(
            db.clone(),
            curves,
            snapshots,
            Arc::new(notifier),
            Arc::new(NullFeed),
        );

        Fixture {
            service,
            events,
            test_id: test.id,
            subtype_id: subtype.id,
            db,
        }
    }

    fn athlete_request(fx: &Fixture, user: Uuid, controller: Option<Uuid>) -> SubmitRequest {
        SubmitRequest {
            subtype_id: fx.subtype_id,
            test_id: fx.test_id,
            user_id: user,
            origin: Origin::Athlete {
                controller_id: controller,
            },
            value: 5.2,
            body_weight: None,
            gender: Gender::Male,
            executed_at: Utc::now(),
            is_public: true,
        }
    }

    #[test]
    fn test_submit_scores_against_curve() {
        let fx = fixture();
        let result = fx
            .service
            .submit(athlete_request(&fx, Uuid::new_v4(), None))
            .unwrap();

        assert_eq!(result.point, 70.0);
        assert_eq!(result.level, Level::Pro);
        assert!(!result.is_verified);
        assert!(!result.is_confirmed);
    }

    #[test]
    fn test_submit_with_controller_requests_verification() {
        let fx = fixture();
        let controller = Uuid::new_v4();
        let result = fx
            .service
            .submit(athlete_request(&fx, Uuid::new_v4(), Some(controller)))
            .unwrap();

        match fx.events.try_recv().unwrap() {
            NotificationEvent::VerificationRequested {
                result_id,
                controller_id,
                ..
            } => {
                assert_eq!(result_id, result.id);
                assert_eq!(controller_id, controller);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_self_verification_rejected() {
        let fx = fixture();
        let user = Uuid::new_v4();
        let err = fx
            .service
            .submit(athlete_request(&fx, user, Some(user)))
            .unwrap_err();
        assert!(matches!(err, ResultError::SelfVerification));
        assert_eq!(err.code(), "RESULT_SELF_VERIFICATION");
    }

    #[test]
    fn test_coach_submission_is_verified_and_rolls_snapshot() {
        let fx = fixture();
        let athlete = Uuid::new_v4();
        let coach = Uuid::new_v4();

        let mut req = athlete_request(&fx, athlete, None);
        req.origin = Origin::Coach { coach_id: coach };
        let result = fx.service.submit(req).unwrap();

        assert!(result.is_verified);
        assert!(result.is_confirmed);
        assert_eq!(result.controller_id, Some(coach));

        let snapshot = fx
            .db
            .get_snapshot(&athlete, TestCategory::Physical)
            .unwrap()
            .expect("snapshot missing");
        assert_eq!(snapshot.avg_point, 70.0);

        assert!(matches!(
            fx.events.try_recv().unwrap(),
            NotificationEvent::CoachResultRecorded { .. }
        ));
    }

    #[test]
    fn test_verify_accepts_once_only() {
        let fx = fixture();
        let athlete = Uuid::new_v4();
        let controller = Uuid::new_v4();
        let result = fx
            .service
            .submit(athlete_request(&fx, athlete, Some(controller)))
            .unwrap();
        fx.events.try_recv().unwrap();

        let verified = fx
            .service
            .verify(&result.id, &controller, VerificationDecision::Verified)
            .unwrap();
        assert!(verified.is_verified);
        assert!(verified.is_confirmed);
        assert!(matches!(
            fx.events.try_recv().unwrap(),
            NotificationEvent::ResultVerified { .. }
        ));

        let err = fx
            .service
            .verify(&result.id, &controller, VerificationDecision::Rejected)
            .unwrap_err();
        assert!(matches!(err, ResultError::AlreadyConfirmed));

        // The first decision stands.
        assert!(fx.service.get(&result.id).unwrap().is_verified);
    }

    #[test]
    fn test_verify_requires_designated_controller() {
        let fx = fixture();
        let result = fx
            .service
            .submit(athlete_request(&fx, Uuid::new_v4(), Some(Uuid::new_v4())))
            .unwrap();

        let err = fx
            .service
            .verify(&result.id, &Uuid::new_v4(), VerificationDecision::Verified)
            .unwrap_err();
        assert!(matches!(err, ResultError::NotController));
    }

    #[test]
    fn test_rejected_result_stays_out_of_snapshot() {
        let fx = fixture();
        let athlete = Uuid::new_v4();
        let controller = Uuid::new_v4();
        let result = fx
            .service
            .submit(athlete_request(&fx, athlete, Some(controller)))
            .unwrap();

        let rejected = fx
            .service
            .verify(&result.id, &controller, VerificationDecision::Rejected)
            .unwrap();
        assert!(!rejected.is_verified);
        assert!(rejected.is_confirmed);

        assert!(fx
            .db
            .get_snapshot(&athlete, TestCategory::Physical)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_update_blocked_after_verification() {
        let fx = fixture();
        let athlete = Uuid::new_v4();
        let controller = Uuid::new_v4();
        let result = fx
            .service
            .submit(athlete_request(&fx, athlete, Some(controller)))
            .unwrap();

        // Unverified: the owner may rewrite the measurement.
        let updated = fx
            .service
            .update(&result.id, &athlete, 4.9, None, Gender::Male, Utc::now())
            .unwrap();
        assert_eq!(updated.point, 90.0);

        fx.service
            .verify(&result.id, &controller, VerificationDecision::Verified)
            .unwrap();

        let err = fx
            .service
            .update(&result.id, &athlete, 6.0, None, Gender::Male, Utc::now())
            .unwrap_err();
        assert!(matches!(err, ResultError::CannotUpdateVerified));
    }

    #[test]
    fn test_delete_blocked_for_verified() {
        let fx = fixture();
        let athlete = Uuid::new_v4();
        let controller = Uuid::new_v4();
        let result = fx
            .service
            .submit(athlete_request(&fx, athlete, Some(controller)))
            .unwrap();
        fx.service
            .verify(&result.id, &controller, VerificationDecision::Verified)
            .unwrap();

        let err = fx.service.delete(&result.id, &athlete).unwrap_err();
        assert!(matches!(err, ResultError::CannotDeleteVerified));
    }

    #[test]
    fn test_share_gatekeeping() {
        let fx = fixture();
        let athlete = Uuid::new_v4();
        let controller = Uuid::new_v4();
        let result = fx
            .service
            .submit(athlete_request(&fx, athlete, Some(controller)))
            .unwrap();

        let err = fx.service.share(&result.id, &Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), "SHARE_NOT_OWNER");

        let err = fx.service.share(&result.id, &athlete).unwrap_err();
        assert_eq!(err.code(), "SHARE_UNVERIFIED");

        fx.service
            .verify(&result.id, &controller, VerificationDecision::Verified)
            .unwrap();
        fx.service.share(&result.id, &athlete).unwrap();
    }

    #[test]
    fn test_deleted_unverified_result_disappears() {
        let fx = fixture();
        let athlete = Uuid::new_v4();
        let result = fx
            .service
            .submit(athlete_request(&fx, athlete, None))
            .unwrap();

        fx.service.delete(&result.id, &athlete).unwrap();
        assert!(matches!(
            fx.service.get(&result.id),
            Err(ResultError::NotFound(_))
        ));
    }
}
