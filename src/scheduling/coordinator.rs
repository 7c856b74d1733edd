use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use crate::{
    db::{
        models::{Booking, BookingStatus, Role},
        Database, InsertOutcome,
    },
    error::{BookingError, BookingResult},
    log_info, log_warn,
    requester::Requester,
};

use super::{AvailabilityEngine, TimeInterval};

const ENABLE_LOGS: bool = true;
const MEETING_TOKEN_LEN: usize = 32;

fn generate_meeting_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(MEETING_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Owns the booking lifecycle: creation with conflict detection, status
/// transitions, and party-only reads.
#[derive(Clone)]
pub struct BookingCoordinator {
    db: Database,
    availability: AvailabilityEngine,
}

impl BookingCoordinator {
    pub fn new(db: Database) -> Self {
        Self {
            availability: AvailabilityEngine::new(db.clone()),
            db,
        }
    }

    pub fn availability(&self) -> &AvailabilityEngine {
        &self.availability
    }

    pub async fn create(
        &self,
        requester: &Requester,
        mentor_id: &str,
        interval: TimeInterval,
        notes: Option<String>,
    ) -> BookingResult<Booking> {
        interval.validate()?;
        requester.require_role(Role::Mentee, "create bookings")?;

        match self.db.get_user(&requester.id).await? {
            Some(user) if user.role == Role::Mentee => {}
            _ => return Err(BookingError::not_found("mentee", &requester.id)),
        }
        match self.db.get_user(mentor_id).await? {
            Some(user) if user.is_mentor() => {}
            _ => return Err(BookingError::not_found("mentor", mentor_id)),
        }

        if let Some(existing) = self.availability.find_conflict(mentor_id, interval).await? {
            return Err(BookingError::SlotConflict {
                conflicting_id: existing.id,
            });
        }

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            mentor_id: mentor_id.to_string(),
            mentee_id: requester.id.clone(),
            interval,
            status: BookingStatus::Pending,
            notes: notes.filter(|n| !n.trim().is_empty()),
            meeting_token: generate_meeting_token(),
            created_at: now,
            updated_at: now,
        };

        // The read above is only a fast path; this insert re-checks under the write lock.
        match self.db.insert_booking_if_free(&booking).await? {
            InsertOutcome::Inserted => {
                log_info!(
                    "Booking {} created for mentor {} by mentee {}",
                    booking.id,
                    booking.mentor_id,
                    booking.mentee_id
                );
                Ok(booking)
            }
            InsertOutcome::Conflict(existing) => {
                log_warn!(
                    "Booking for mentor {} lost a race to booking {}",
                    mentor_id,
                    existing.id
                );
                Err(BookingError::SlotConflict {
                    conflicting_id: existing.id,
                })
            }
        }
    }

    pub async fn update_status(
        &self,
        booking_id: &str,
        requester: &Requester,
        new_status: BookingStatus,
    ) -> BookingResult<Booking> {
        let mut booking = self.load(booking_id).await?;

        let claimed_side = match requester.role {
            Role::Mentor => &booking.mentor_id,
            Role::Mentee => &booking.mentee_id,
        };
        if claimed_side != &requester.id {
            return Err(BookingError::AccessDenied {
                booking_id: booking.id,
            });
        }

        // Compare-and-swap on the status column. A lost race re-reads the row and
        // re-validates against the status that won; statuses only move forward,
        // so this settles within a couple of rounds.
        let now = Utc::now();
        loop {
            booking.status.ensure_transition(new_status)?;
            if self
                .db
                .compare_and_set_status(&booking.id, booking.status, new_status, now)
                .await?
            {
                break;
            }
            booking = self.load(booking_id).await?;
        }

        log_info!(
            "Booking {} moved {} -> {} by {} {}",
            booking.id,
            booking.status,
            new_status,
            requester.role,
            requester.id
        );

        Ok(Booking {
            status: new_status,
            updated_at: now,
            ..booking
        })
    }

    pub async fn get(&self, booking_id: &str, requester_id: &str) -> BookingResult<Booking> {
        let booking = self.load(booking_id).await?;
        if !booking.involves(requester_id) {
            return Err(BookingError::AccessDenied {
                booking_id: booking.id,
            });
        }
        Ok(booking)
    }

    /// The requester's own bookings on the side their role implies, latest start first.
    pub async fn list_for(&self, requester: &Requester) -> BookingResult<Vec<Booking>> {
        let bookings = match requester.role {
            Role::Mentor => self.db.list_bookings_by_mentor(&requester.id).await?,
            Role::Mentee => self.db.list_bookings_by_mentee(&requester.id).await?,
        };
        Ok(bookings)
    }

    async fn load(&self, booking_id: &str) -> BookingResult<Booking> {
        self.db
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("booking", booking_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::db::models::{AvailabilityTemplate, Profile, WorkingHours};
    use crate::test_support::{add_user, at, hours, seed, seeded_db, slot};

    async fn coordinator() -> BookingCoordinator {
        BookingCoordinator::new(seeded_db().await)
    }

    fn mentee() -> Requester {
        Requester::mentee("mentee-1")
    }

    #[tokio::test]
    async fn create_stores_a_pending_booking() {
        let coordinator = coordinator().await;
        let booking = coordinator
            .create(&mentee(), "mentor-1", hours(10, 1), Some("Career chat".into()))
            .await
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.mentee_id, "mentee-1");
        assert_eq!(booking.notes.as_deref(), Some("Career chat"));
        assert_eq!(booking.meeting_token.len(), MEETING_TOKEN_LEN);

        let stored = coordinator.get(&booking.id, "mentor-1").await.unwrap();
        assert_eq!(stored.interval, booking.interval);
        assert_eq!(stored.meeting_token, booking.meeting_token);
    }

    #[tokio::test]
    async fn meeting_tokens_are_unique() {
        let coordinator = coordinator().await;
        let first = coordinator
            .create(&mentee(), "mentor-1", hours(9, 1), None)
            .await
            .unwrap();
        let second = coordinator
            .create(&mentee(), "mentor-1", hours(10, 1), None)
            .await
            .unwrap();
        assert_ne!(first.meeting_token, second.meeting_token);
    }

    #[tokio::test]
    async fn adjacent_bookings_do_not_conflict() {
        let coordinator = coordinator().await;
        coordinator
            .create(&mentee(), "mentor-1", hours(9, 1), None)
            .await
            .unwrap();
        coordinator
            .create(&mentee(), "mentor-1", hours(10, 1), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn overlapping_booking_is_rejected() {
        let coordinator = coordinator().await;
        let existing = coordinator
            .create(&mentee(), "mentor-1", hours(9, 2), None)
            .await
            .unwrap();

        let err = coordinator
            .create(
                &Requester::mentee("mentee-2"),
                "mentor-1",
                slot((10, 30), (11, 30)),
                None,
            )
            .await
            .unwrap_err();
        match err {
            BookingError::SlotConflict { conflicting_id } => assert_eq!(conflicting_id, existing.id),
            other => panic!("expected SlotConflict, got {other:?}"),
        }

        // Other mentors are unaffected.
        coordinator
            .create(&mentee(), "mentor-2", slot((10, 30), (11, 30)), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_booking_releases_the_slot() {
        let coordinator = coordinator().await;
        let booking = coordinator
            .create(&mentee(), "mentor-1", hours(9, 1), None)
            .await
            .unwrap();
        coordinator
            .update_status(&booking.id, &mentee(), BookingStatus::Cancelled)
            .await
            .unwrap();

        coordinator
            .create(&Requester::mentee("mentee-2"), "mentor-1", hours(9, 1), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn completed_booking_releases_the_slot() {
        let coordinator = coordinator().await;
        let mentor = Requester::mentor("mentor-1");
        let booking = coordinator
            .create(&mentee(), "mentor-1", hours(9, 1), None)
            .await
            .unwrap();
        for status in [BookingStatus::Confirmed, BookingStatus::Completed] {
            coordinator.update_status(&booking.id, &mentor, status).await.unwrap();
        }
        assert!(coordinator.availability().is_free("mentor-1", hours(9, 1)).await.unwrap());
    }

    #[tokio::test]
    async fn create_checks_roles_and_existence() {
        let coordinator = coordinator().await;

        let err = coordinator
            .create(&Requester::mentor("mentor-2"), "mentor-1", hours(9, 1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::RoleViolation(_)));

        let err = coordinator
            .create(&mentee(), "nobody", hours(9, 1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound { entity: "mentor", .. }));

        // A mentee id is not a bookable mentor.
        let err = coordinator
            .create(&mentee(), "mentee-2", hours(9, 1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound { entity: "mentor", .. }));

        let err = coordinator
            .create(&Requester::mentee("ghost"), "mentor-1", hours(9, 1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound { entity: "mentee", .. }));
    }

    #[tokio::test]
    async fn create_rejects_inverted_interval_without_writing() {
        let coordinator = coordinator().await;
        let inverted = TimeInterval {
            start: at(11, 0),
            end: at(10, 0),
        };
        let err = coordinator
            .create(&mentee(), "mentor-1", inverted, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
        assert!(coordinator.list_for(&mentee()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bookings_outside_working_hours_are_accepted() {
        let db = seeded_db().await;
        add_user(
            &db,
            "mentor-9to5",
            Role::Mentor,
            Some(Profile {
                availability: Some(AvailabilityTemplate {
                    timezone: Some("UTC".into()),
                    working_hours: Some(WorkingHours {
                        start: "09:00".into(),
                        end: "17:00".into(),
                    }),
                    days_available: vec!["Tuesday".into()],
                }),
                ..Profile::default()
            }),
        )
        .await;

        // Monday at 22:00 is outside both the hours and the days of the template.
        let booking = BookingCoordinator::new(db)
            .create(&mentee(), "mentor-9to5", hours(22, 1), None)
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn stored_intervals_match_what_create_returned() {
        let coordinator = coordinator().await;
        let requested = TimeInterval::new(
            at(10, 0) + Duration::milliseconds(123),
            at(11, 0) + Duration::milliseconds(456),
        )
        .unwrap();

        let created = coordinator
            .create(&mentee(), "mentor-1", requested, None)
            .await
            .unwrap();
        let stored = coordinator.get(&created.id, "mentee-1").await.unwrap();
        assert_eq!(created.interval, requested);
        assert_eq!(stored.interval, created.interval);
    }

    #[tokio::test]
    async fn sub_millisecond_bounds_are_rejected_before_storage() {
        let coordinator = coordinator().await;
        let tiny = TimeInterval {
            start: at(10, 0) + Duration::microseconds(100),
            end: at(10, 0) + Duration::microseconds(900),
        };
        assert!(matches!(
            coordinator.create(&mentee(), "mentor-1", tiny, None).await,
            Err(BookingError::Validation(_))
        ));

        let ragged_end = TimeInterval {
            start: at(10, 0),
            end: at(11, 0) + Duration::microseconds(500),
        };
        assert!(matches!(
            coordinator.create(&mentee(), "mentor-1", ragged_end, None).await,
            Err(BookingError::Validation(_))
        ));
        assert!(coordinator.list_for(&mentee()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn a_one_millisecond_overlap_is_a_conflict() {
        let coordinator = coordinator().await;
        let first = coordinator
            .create(
                &mentee(),
                "mentor-1",
                TimeInterval::new(at(10, 0), at(11, 0) + Duration::milliseconds(1)).unwrap(),
                None,
            )
            .await
            .unwrap();

        let err = coordinator
            .create(
                &Requester::mentee("mentee-2"),
                "mentor-1",
                hours(11, 1),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::SlotConflict { conflicting_id } if conflicting_id == first.id
        ));
    }

    #[tokio::test]
    async fn concurrent_creates_for_the_same_slot_admit_exactly_one() {
        let coordinator = coordinator().await;
        let mentee_1 = mentee();
        let mentee_2 = Requester::mentee("mentee-2");

        let (first, second) = tokio::join!(
            coordinator.create(&mentee_1, "mentor-1", hours(14, 1), None),
            coordinator.create(&mentee_2, "mentor-1", slot((14, 30), (15, 30)), None),
        );

        let outcomes = [first, second];
        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        let conflicts = outcomes
            .iter()
            .filter(|r| matches!(r, Err(BookingError::SlotConflict { .. })))
            .count();
        assert_eq!((successes, conflicts), (1, 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_creates_never_double_book() {
        let coordinator = coordinator().await;

        let mut handles = Vec::new();
        for i in 0..24u32 {
            let coordinator = coordinator.clone();
            let requester = Requester::mentee(if i % 2 == 0 { "mentee-1" } else { "mentee-2" });
            // Every request overlaps at least two of its neighbours.
            let interval = slot((8 + i / 4, (i % 4) * 15), (9 + i / 4, (i % 4) * 15));
            handles.push(tokio::spawn(async move {
                coordinator.create(&requester, "mentor-1", interval, None).await
            }));
        }

        let mut created = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(booking) => created.push(booking),
                Err(BookingError::SlotConflict { .. }) => {}
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }

        assert!(!created.is_empty());
        let stored = coordinator
            .list_for(&Requester::mentor("mentor-1"))
            .await
            .unwrap();
        assert_eq!(stored.len(), created.len());
        for (i, a) in stored.iter().enumerate() {
            for b in &stored[i + 1..] {
                assert!(!a.interval.overlaps(&b.interval), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn separate_handles_on_one_file_admit_exactly_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.sqlite3");

        let first_db = Database::new(path.clone()).unwrap();
        seed(&first_db).await;
        let second_db = Database::new(path).unwrap();

        let first = BookingCoordinator::new(first_db);
        let second = BookingCoordinator::new(second_db);

        let a = tokio::spawn(async move {
            first
                .create(&Requester::mentee("mentee-1"), "mentor-1", hours(9, 1), None)
                .await
        });
        let b = tokio::spawn(async move {
            second
                .create(&Requester::mentee("mentee-2"), "mentor-1", hours(9, 1), None)
                .await
        });

        let outcomes = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(BookingError::SlotConflict { .. })))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn lifecycle_runs_end_to_end() {
        let coordinator = coordinator().await;
        let mentor = Requester::mentor("mentor-1");
        let booking = coordinator
            .create(&mentee(), "mentor-1", hours(9, 1), None)
            .await
            .unwrap();

        let confirmed = coordinator
            .update_status(&booking.id, &mentor, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let completed = coordinator
            .update_status(&booking.id, &mentor, BookingStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);

        let stored = coordinator.get(&booking.id, "mentee-1").await.unwrap();
        assert_eq!(stored.status, BookingStatus::Completed);
        assert_eq!(stored.notes, booking.notes);
    }

    #[tokio::test]
    async fn illegal_transitions_are_rejected() {
        let coordinator = coordinator().await;
        let mentor = Requester::mentor("mentor-1");
        let booking = coordinator
            .create(&mentee(), "mentor-1", hours(9, 1), None)
            .await
            .unwrap();

        let err = coordinator
            .update_status(&booking.id, &mentor, BookingStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { .. }));

        coordinator
            .update_status(&booking.id, &mentor, BookingStatus::Confirmed)
            .await
            .unwrap();
        let err = coordinator
            .update_status(&booking.id, &mentor, BookingStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::InvalidTransition {
                from: BookingStatus::Confirmed,
                to: BookingStatus::Pending
            }
        ));

        coordinator
            .update_status(&booking.id, &mentee(), BookingStatus::Cancelled)
            .await
            .unwrap();
        for next in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            let err = coordinator
                .update_status(&booking.id, &mentor, next)
                .await
                .unwrap_err();
            assert!(matches!(err, BookingError::InvalidTransition { .. }));
        }
    }

    #[tokio::test]
    async fn concurrent_cancels_succeed_once() {
        let coordinator = coordinator().await;
        let booking = coordinator
            .create(&mentee(), "mentor-1", hours(9, 1), None)
            .await
            .unwrap();
        let mentee_1 = mentee();
        let mentor = Requester::mentor("mentor-1");

        let (a, b) = tokio::join!(
            coordinator.update_status(&booking.id, &mentee_1, BookingStatus::Cancelled),
            coordinator.update_status(&booking.id, &mentor, BookingStatus::Cancelled),
        );
        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|r| matches!(
            r,
            Err(BookingError::InvalidTransition {
                from: BookingStatus::Cancelled,
                ..
            })
        )));
    }

    #[tokio::test]
    async fn status_changes_require_the_claimed_side() {
        let coordinator = coordinator().await;
        let booking = coordinator
            .create(&mentee(), "mentor-1", hours(9, 1), None)
            .await
            .unwrap();

        for requester in [
            Requester::mentor("mentor-2"),
            Requester::mentee("mentee-2"),
            // Right id, wrong side.
            Requester::mentor("mentee-1"),
            Requester::mentee("mentor-1"),
        ] {
            let err = coordinator
                .update_status(&booking.id, &requester, BookingStatus::Confirmed)
                .await
                .unwrap_err();
            assert!(
                matches!(err, BookingError::AccessDenied { .. }),
                "{requester:?} got {err:?}"
            );
        }

        let err = coordinator
            .update_status("missing", &mentee(), BookingStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound { entity: "booking", .. }));
    }

    #[tokio::test]
    async fn get_is_limited_to_the_parties() {
        let coordinator = coordinator().await;
        let booking = coordinator
            .create(&mentee(), "mentor-1", hours(9, 1), None)
            .await
            .unwrap();

        assert!(coordinator.get(&booking.id, "mentee-1").await.is_ok());
        assert!(coordinator.get(&booking.id, "mentor-1").await.is_ok());
        assert!(matches!(
            coordinator.get(&booking.id, "mentee-2").await,
            Err(BookingError::AccessDenied { .. })
        ));
        assert!(matches!(
            coordinator.get("missing", "mentee-1").await,
            Err(BookingError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn listings_are_per_side_and_latest_first() {
        let coordinator = coordinator().await;
        for start in [9, 13, 11] {
            coordinator
                .create(&mentee(), "mentor-1", hours(start, 1), None)
                .await
                .unwrap();
        }
        coordinator
            .create(&Requester::mentee("mentee-2"), "mentor-2", hours(9, 1), None)
            .await
            .unwrap();

        let mine = coordinator.list_for(&mentee()).await.unwrap();
        let starts: Vec<_> = mine.iter().map(|b| b.interval.start).collect();
        assert_eq!(starts, vec![at(13, 0), at(11, 0), at(9, 0)]);

        let mentor_view = coordinator
            .list_for(&Requester::mentor("mentor-2"))
            .await
            .unwrap();
        assert_eq!(mentor_view.len(), 1);
        assert_eq!(mentor_view[0].mentee_id, "mentee-2");
    }
}
