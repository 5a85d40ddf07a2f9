use crate::infra::{progress, InMemoryAuditLog, StaticDegreeAudit};
use chrono::{Local, NaiveDate};
use clap::Args;
use graduation_clearance::error::AppError;
use graduation_clearance::workflows::graduation::{
    Actor, ApplicationId, ApplicationSubmission, ApplicationView, ClearanceServiceError,
    Department, GraduationClearanceService, InMemoryApplicationStore, ProgramId, StudentId,
    TermId,
};
use std::sync::Arc;

type DemoService =
    GraduationClearanceService<InMemoryApplicationStore, InMemoryAuditLog, StaticDegreeAudit>;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Student identifier used for the sample application
    #[arg(long, default_value = "stu-1001")]
    pub(crate) student: String,
    /// Program the student is graduating from
    #[arg(long, default_value = "bsc-computer-science")]
    pub(crate) program: String,
    /// Graduation term
    #[arg(long, default_value = "2026-spring")]
    pub(crate) term: String,
    /// Credits completed reported by the degree audit (defaults to the requirement)
    #[arg(long)]
    pub(crate) credits_completed: Option<f32>,
    /// Ceremony date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) ceremony_date: Option<NaiveDate>,
    /// Skip the library hold raised after every department has cleared
    #[arg(long)]
    pub(crate) skip_late_hold: bool,
}

const CREDITS_NEEDED: f32 = 120.0;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        student,
        program,
        term,
        credits_completed,
        ceremony_date,
        skip_late_hold,
    } = args;

    let student_id = StudentId(student);
    let mut degree_audit = StaticDegreeAudit::default();
    degree_audit.insert(
        student_id.clone(),
        progress(credits_completed.unwrap_or(CREDITS_NEEDED), CREDITS_NEEDED),
    );

    let audit = Arc::new(InMemoryAuditLog::default());
    let service: DemoService = GraduationClearanceService::new(
        Arc::new(InMemoryApplicationStore::default()),
        audit.clone(),
        Arc::new(degree_audit),
    );

    let registrar = Actor::new("registrar-office");
    println!("Graduation clearance demo");

    let submission = ApplicationSubmission {
        student_id,
        program_id: ProgramId(program),
        term_id: TermId(term),
        application_date: Some(Local::now().date_naive()),
        ceremony_date,
        special_requests: None,
    };
    let view = match service.submit(&registrar, submission) {
        Ok(view) => view,
        Err(err) => {
            println!("  Submission rejected: {err}");
            return Ok(());
        }
    };
    render("submitted", &view);

    if let Err(err) = walk(&service, &registrar, &view.id, skip_late_hold) {
        println!("  Workflow stopped: {} ({})", err, err.code());
    }

    println!("\nAudit trail");
    for event in audit.events() {
        let department = event
            .department
            .map(|department| format!(" [{department}]"))
            .unwrap_or_default();
        let change = match (event.from_status, event.to_status) {
            (Some(from), Some(to)) => format!("{from} -> {to}"),
            (None, Some(to)) => format!("-> {to}"),
            (Some(from), None) => format!("{from} ->"),
            (None, None) => String::new(),
        };
        println!(
            "- {} {}{} by {}: {}",
            event.occurred_at.format("%H:%M:%S"),
            event.action.label(),
            department,
            event.actor,
            change
        );
    }

    Ok(())
}

fn walk(
    service: &DemoService,
    registrar: &Actor,
    id: &ApplicationId,
    skip_late_hold: bool,
) -> Result<(), ClearanceServiceError> {
    render("under review", &service.submit_for_review(registrar, id)?);

    let opened = service.begin_clearance(registrar, id)?;
    render("clearance opened", &opened);
    if let Some(snapshot) = &opened.degree_audit_snapshot {
        println!(
            "  Degree audit: {:.0}/{:.0} credits ({:.0}%), eligible: {}",
            snapshot.overall_progress.credits_completed,
            snapshot.overall_progress.credits_needed,
            snapshot.overall_progress.percentage_complete,
            snapshot.graduation_eligible
        );
    }

    for department in Department::ALL {
        let office = Actor::new(format!("{}-office", department.label()));
        let view = service.clear(&office, id, department.label(), None)?;
        render(&format!("{department} cleared"), &view);
    }

    if !skip_late_hold {
        let library = Actor::new("library-office");
        let held = service.block(&library, id, "library", "Replacement fee for lost book")?;
        render("library hold", &held);

        match service.final_approve(registrar, id, None) {
            Ok(_) => println!("  Unexpected approval while a hold is open"),
            Err(err) => println!("  Final approval refused: {err}"),
        }

        let resolved = service.clear(
            &library,
            id,
            "library",
            Some("Fee paid at circulation desk".to_string()),
        )?;
        render("library hold resolved", &resolved);
    }

    let approved = service.final_approve(registrar, id, Some("Cleared for ceremony".to_string()))?;
    render("final decision", &approved);
    Ok(())
}

fn render(step: &str, view: &ApplicationView) {
    match view.clearance_summary {
        Some(summary) => println!(
            "- {}: {} -> {} | {}/{} cleared, {} pending, {} on hold",
            step,
            view.id,
            view.status,
            summary.cleared,
            summary.total,
            summary.pending,
            summary.hold
        ),
        None => println!("- {}: {} -> {}", step, view.id, view.status),
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
