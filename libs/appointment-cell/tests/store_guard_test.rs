use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;
use mockall::predicate::eq;
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentChanges, AppointmentError, AppointmentStatus, AppointmentSummary,
    BookAppointmentRequest, ListQuery, NewAppointment, TimeSlot, UpdateAppointmentRequest,
};
use appointment_cell::services::AppointmentBookingService;
use appointment_cell::store::{AppointmentStore, StoreError};
use shared_utils::test_utils::at;

mock! {
    pub Store {}

    #[async_trait]
    impl AppointmentStore for Store {
        async fn find_overlapping(
            &self,
            professional_id: Uuid,
            slot: TimeSlot,
            exclude_id: Option<Uuid>,
        ) -> Result<Vec<Appointment>, StoreError>;

        async fn find_cancelled(
            &self,
            patient_id: Uuid,
            professional_id: Uuid,
            slot: TimeSlot,
        ) -> Result<Option<Appointment>, StoreError>;

        async fn create(&self, appointment: NewAppointment) -> Result<Appointment, StoreError>;

        async fn update(&self, id: Uuid, changes: AppointmentChanges) -> Result<Appointment, StoreError>;

        async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

        async fn list_by_professional(
            &self,
            professional_id: Uuid,
            query: ListQuery,
        ) -> Result<Vec<AppointmentSummary>, StoreError>;

        async fn list_by_patient(
            &self,
            patient_id: Uuid,
            query: ListQuery,
        ) -> Result<Vec<AppointmentSummary>, StoreError>;
    }
}

fn stored(professional_id: Uuid, slot: TimeSlot, status: AppointmentStatus) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        professional_id,
        start_time: slot.start,
        end_time: slot.end,
        status,
        created_at: now,
        updated_at: now,
    }
}

fn from_new(new: NewAppointment) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        patient_id: new.patient_id,
        professional_id: new.professional_id,
        start_time: new.start_time,
        end_time: new.end_time,
        status: new.status,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn test_invalid_range_never_reaches_the_store() {
    // No expectations: any store call panics.
    let service = AppointmentBookingService::new(Arc::new(MockStore::new()));

    let booking = service
        .book_appointment(BookAppointmentRequest {
            patient_id: Uuid::new_v4(),
            professional_id: Uuid::new_v4(),
            start_time: at(11, 0),
            end_time: at(10, 0),
        })
        .await;
    let update = service
        .update_appointment(Uuid::new_v4(), UpdateAppointmentRequest {
            start_time: Some(at(12, 0)),
            end_time: Some(at(12, 0)),
            status: None,
        })
        .await;

    assert_matches!(booking, Err(AppointmentError::ValidationError(_)));
    assert_matches!(update, Err(AppointmentError::ValidationError(_)));
}

#[tokio::test]
async fn test_conflict_performs_no_write() {
    let professional = Uuid::new_v4();
    let slot = TimeSlot::new(at(10, 0), at(11, 0)).unwrap();
    let existing = stored(professional, slot, AppointmentStatus::Confirmed);

    let mut store = MockStore::new();
    store
        .expect_find_overlapping()
        .with(eq(professional), eq(TimeSlot::new(at(10, 30), at(10, 45)).unwrap()), eq(None::<Uuid>))
        .times(1)
        .returning(move |_, _, _| Ok(vec![existing.clone()]));
    store.expect_find_cancelled().never();
    store.expect_create().never();
    store.expect_update().never();

    let service = AppointmentBookingService::new(Arc::new(store));
    let result = service
        .book_appointment(BookAppointmentRequest {
            patient_id: Uuid::new_v4(),
            professional_id: professional,
            start_time: at(10, 30),
            end_time: at(10, 45),
        })
        .await;

    assert_matches!(result, Err(AppointmentError::ConflictDetected));
}

#[tokio::test]
async fn test_over_fetched_rows_are_not_conflicts() {
    let professional = Uuid::new_v4();
    let requested = TimeSlot::new(at(10, 0), at(11, 0)).unwrap();
    let cancelled_same_slot = stored(professional, requested, AppointmentStatus::Cancelled);
    let touching = stored(
        professional,
        TimeSlot::new(at(11, 0), at(12, 0)).unwrap(),
        AppointmentStatus::Pending,
    );

    let mut store = MockStore::new();
    store
        .expect_find_overlapping()
        .returning(move |_, _, _| Ok(vec![cancelled_same_slot.clone(), touching.clone()]));
    store.expect_find_cancelled().times(1).returning(|_, _, _| Ok(None));
    store
        .expect_create()
        .times(1)
        .withf(|new: &NewAppointment| new.status == AppointmentStatus::Pending)
        .returning(|new| Ok(from_new(new)));

    let service = AppointmentBookingService::new(Arc::new(store));
    let appointment = service
        .book_appointment(BookAppointmentRequest {
            patient_id: Uuid::new_v4(),
            professional_id: professional,
            start_time: requested.start,
            end_time: requested.end,
        })
        .await
        .unwrap();

    assert_eq!(appointment.slot(), requested);
}

#[tokio::test]
async fn test_store_failures_propagate_unmasked() {
    let mut store = MockStore::new();
    store
        .expect_find_overlapping()
        .returning(|_, _, _| Err(StoreError::Database("connection reset".to_string())));
    store.expect_create().never();

    let service = AppointmentBookingService::new(Arc::new(store));
    let result = service
        .book_appointment(BookAppointmentRequest {
            patient_id: Uuid::new_v4(),
            professional_id: Uuid::new_v4(),
            start_time: at(10, 0),
            end_time: at(11, 0),
        })
        .await;

    assert_matches!(result, Err(AppointmentError::Store(StoreError::Database(msg))) if msg == "connection reset");
}

#[tokio::test]
async fn test_update_losing_the_race_reports_conflict() {
    let professional = Uuid::new_v4();
    let current = stored(
        professional,
        TimeSlot::new(at(9, 0), at(10, 0)).unwrap(),
        AppointmentStatus::Pending,
    );
    let id = current.id;

    let mut store = MockStore::new();
    store
        .expect_find_by_id()
        .with(eq(id))
        .returning(move |_| Ok(Some(current.clone())));
    store
        .expect_find_overlapping()
        .withf(move |p, _, exclude| *p == professional && *exclude == Some(id))
        .returning(|_, _, _| Ok(vec![]));
    store
        .expect_update()
        .times(1)
        .returning(|_, _| Err(StoreError::Conflict));

    let service = AppointmentBookingService::new(Arc::new(store));
    let result = service
        .update_appointment(id, UpdateAppointmentRequest {
            start_time: Some(at(9, 30)),
            end_time: Some(at(10, 30)),
            status: Some(AppointmentStatus::Confirmed),
        })
        .await;

    assert_matches!(result, Err(AppointmentError::ConflictDetected));
}

#[tokio::test]
async fn test_listing_limit_is_resolved_before_the_store() {
    let patient = Uuid::new_v4();

    let mut store = MockStore::new();
    store
        .expect_list_by_patient()
        .with(eq(patient), eq(ListQuery::page(40, 500)))
        .times(1)
        .returning(|_, _| Ok(vec![]));

    let service = AppointmentBookingService::new(Arc::new(store));
    let page = service
        .list_patient_appointments(patient, ListQuery::page(40, 10_000))
        .await
        .unwrap();

    assert!(page.is_empty());
}
