use crate::infra::parse_status;
use chrono::{Duration, Utc};
use clap::Args;
use recruitment::applications::{
    ApplicantRecord, ApplicantStore, ApplicationService, ApplicationStatus, Caller,
    InMemoryApplicantStore, NewApplicant, NewAvailabilityPeriod, NewCompetenceProfile,
    RecordingEventSink,
};
use recruitment::error::AppError;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Status recruiter A assigns first
    #[arg(long, default_value = "accepted", value_parser = parse_status)]
    pub(crate) first: ApplicationStatus,
    /// Status recruiter B tries to assign from the same stale read
    #[arg(long, default_value = "rejected", value_parser = parse_status)]
    pub(crate) second: ApplicationStatus,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryApplicantStore::default());
    let competence = store.add_competence("ticket sales")?;
    let events = Arc::new(RecordingEventSink::default());
    let service = ApplicationService::new(store, events.clone());

    println!("Recruiter review demo");

    let registered = match service.register(demo_applicant(competence.competence_id)) {
        Ok(record) => record,
        Err(err) => {
            println!("  Registration rejected: {err}");
            return Ok(());
        }
    };
    print_record("Registered", &registered);

    let recruiter_a = Caller::recruiter();
    let recruiter_b = Caller::recruiter();

    let (seen_by_a, seen_by_b) = match (
        service.get(&recruiter_a, registered.id),
        service.get(&recruiter_b, registered.id),
    ) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(err), _) | (_, Err(err)) => {
            println!("  Lookup failed: {err}");
            return Ok(());
        }
    };
    println!(
        "\nBoth recruiters opened application {} at token {}",
        seen_by_a.id, seen_by_b.last_modified_at
    );

    match service.update_status(
        &recruiter_a,
        seen_by_a.id,
        args.first,
        seen_by_a.last_modified_at,
    ) {
        Ok(record) => print_record("Recruiter A saved", &record),
        Err(err) => println!("  Recruiter A failed: {err}"),
    }

    match service.update_status(
        &recruiter_b,
        seen_by_b.id,
        args.second,
        seen_by_b.last_modified_at,
    ) {
        Ok(record) => print_record("Recruiter B saved", &record),
        Err(err) => println!("\nRecruiter B was turned away: {err}"),
    }

    match service.get(&recruiter_b, seen_by_b.id).and_then(|fresh| {
        println!(
            "Recruiter B reloads and sees '{}' at token {}",
            fresh.status, fresh.last_modified_at
        );
        service.update_status(&recruiter_b, fresh.id, args.second, fresh.last_modified_at)
    }) {
        Ok(record) => print_record("Recruiter B saved after reload", &record),
        Err(err) => println!("  Retry failed: {err}"),
    }

    let published = events.events();
    if published.is_empty() {
        println!("\nStatus events: none published");
    } else {
        println!("\nStatus events:");
        for event in published {
            println!(
                "  applicant {}: {} -> {} at {}",
                event.applicant_id, event.previous, event.current, event.last_modified_at
            );
        }
    }

    Ok(())
}

fn print_record(heading: &str, record: &ApplicantRecord) {
    println!(
        "\n{heading}: applicant {} ({} {})\n  status: {}\n  last modified: {}",
        record.id, record.name, record.surname, record.status, record.last_modified_at
    );
}

fn demo_applicant(competence_id: i64) -> NewApplicant {
    let season_start = Utc::now().date_naive() + Duration::days(30);
    let season_end = season_start + Duration::days(92);
    NewApplicant {
        name: "Per".to_string(),
        surname: "Strand".to_string(),
        email: Some("per.strand@example.se".to_string()),
        personal_id: Some("198505051234".to_string()),
        competence_profiles: vec![NewCompetenceProfile {
            competence_id,
            years_of_experience: 4.0,
        }],
        availability_periods: vec![NewAvailabilityPeriod {
            from_date: season_start,
            to_date: season_end,
        }],
    }
}
