use chrono::Duration;
use cucumber::{then, when};
use fee_payment_engine::{
    db_types::{AccountStatus, Centavos, ContractStatus, Decision, SubmissionStatus, UserId},
    FeeLedgerDatabase,
};

use crate::{
    cucumber::FeeWorld,
    support::{admin, receipt},
};

#[when(expr = "'{word}' opens a fee order for bid '{word}' with key '{word}'")]
async fn open_order(world: &mut FeeWorld, caller: String, bid: String, key: String) {
    let caller = UserId::from(caller);
    match world.system().orders.create_order(&bid.into(), &caller, &key).await {
        Ok(order) => {
            world.order = Some(order);
            world.payer = Some(caller);
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[then(expr = "the order amount is {int} pesos")]
async fn check_order_amount(world: &mut FeeWorld, pesos: i64) {
    let order = world.order.as_ref().expect("No order was opened");
    assert_eq!(order.amount, Centavos::from_pesos(pesos), "Order amount is incorrect");
}

#[when(expr = "'{word}' submits evidence '{word}'")]
async fn submit_evidence(world: &mut FeeWorld, caller: String, evidence: String) {
    let order = world.order.as_ref().expect("No order was opened").order_id.clone();
    let evidence_ref = format!("s3://evidence/{evidence}");
    let submission = world
        .system()
        .verification
        .submit_evidence(&order, &caller.into(), &evidence_ref)
        .await
        .expect("Error submitting evidence");
    world.submission = Some(submission.submission_id);
}

#[when(expr = "the extractor reads {int} pesos paid to the platform with reference {string}")]
async fn extractor_reads(world: &mut FeeWorld, pesos: i64, reference: String) {
    let id = world.submission().clone();
    let outcome = receipt(Centavos::from_pesos(pesos), &reference);
    let outcome =
        world.system().verification.process_extraction(&id, outcome).await.expect("Error processing extraction");
    world.outcome = Some(outcome);
}

async fn submission_status(world: &FeeWorld) -> SubmissionStatus {
    let id = world.submission();
    let submission = world.system().db.fetch_submission(id).await.expect("Error fetching submission");
    submission.expect("Submission does not exist").status
}

#[then("the submission is approved")]
async fn check_approved(world: &mut FeeWorld) {
    assert_eq!(submission_status(world).await, SubmissionStatus::Approved);
}

#[then("the submission is rejected")]
async fn check_rejected(world: &mut FeeWorld) {
    assert_eq!(submission_status(world).await, SubmissionStatus::Rejected);
}

#[then("the submission is waiting for manual review")]
async fn check_manual_review(world: &mut FeeWorld) {
    assert_eq!(submission_status(world).await, SubmissionStatus::ManualReview);
}

#[then(expr = "it was flagged {word}")]
async fn check_flag(world: &mut FeeWorld, rule: String) {
    let outcome = world.outcome.as_ref().expect("No extraction was processed");
    let raised = outcome.assessment.flags.iter().any(|f| f.rule.to_string() == rule);
    assert!(raised, "{rule} was not raised. Flags: {}", outcome.assessment.summary());
}

#[when(expr = "an admin rejects the submission because {string}")]
async fn admin_rejects(world: &mut FeeWorld, reason: String) {
    let id = world.submission().clone();
    world
        .system()
        .decisions
        .resolve(&id, Decision::Reject, &admin(), None, Some(reason))
        .await
        .expect("Error rejecting submission");
}

#[when("an admin approves the submission")]
async fn admin_approves(world: &mut FeeWorld) {
    let id = world.submission().clone();
    if let Err(e) = world.system().decisions.resolve(&id, Decision::Approve, &admin(), None, None).await {
        world.last_error = Some(e);
    }
}

#[then(expr = "the contract for bid '{word}' is in draft with the fee paid")]
async fn check_contract_paid(world: &mut FeeWorld, bid: String) {
    let contract = world.system().contracts.fetch_contract_for_bid(&bid.into()).await.expect("No contract");
    assert_eq!(contract.status, ContractStatus::Draft);
    assert!(contract.platform_fee_paid, "Fee is not marked as paid");
}

#[then(expr = "the contract for bid '{word}' is still pending payment")]
async fn check_contract_pending(world: &mut FeeWorld, bid: String) {
    let contract = world.system().contracts.fetch_contract_for_bid(&bid.into()).await.expect("No contract");
    assert_eq!(contract.status, ContractStatus::PendingPayment);
    assert!(!contract.platform_fee_paid, "Fee should not be paid");
}

#[then(expr = "the ledger for bid '{word}' has {int} entry/entries")]
async fn check_ledger(world: &mut FeeWorld, bid: String, count: usize) {
    let entries = world.system().db.fetch_ledger_entries_for_bid(&bid.into()).await.expect("Error fetching ledger");
    assert_eq!(entries.len(), count, "Ledger entry count is incorrect");
}

#[then(expr = "'{word}' owes {int} pesos")]
async fn check_outstanding(world: &mut FeeWorld, user: String, pesos: i64) {
    let account = world.system().db.fetch_user_account(&user.into()).await.expect("Error fetching account");
    let account = account.expect("Account does not exist");
    assert_eq!(account.outstanding_platform_fees, Centavos::from_pesos(pesos), "Outstanding fees are incorrect");
}

#[then(expr = "the request fails with {word}")]
async fn check_error(world: &mut FeeWorld, code: String) {
    let err = world.last_error.take().expect("The request did not fail");
    assert_eq!(err.code().to_string(), code, "Unexpected error: {err}");
}

#[when(expr = "the billing clock runs {int} hours after acceptance")]
async fn run_billing(world: &mut FeeWorld, hours: i64) {
    let now = world.accepted_at() + Duration::hours(hours);
    let report = world.system().billing.run_billing_cycle(now).await.expect("Error running billing");
    world.report = Some(report);
}

#[then(expr = "{int} first reminder(s) was/were sent")]
async fn check_first_reminders(world: &mut FeeWorld, count: usize) {
    let report = world.report.as_ref().expect("Billing has not run");
    assert_eq!(report.day1_reminders, count, "Report: {report}");
}

#[then(expr = "{int} final warning(s) was/were sent")]
async fn check_final_warnings(world: &mut FeeWorld, count: usize) {
    let report = world.report.as_ref().expect("Billing has not run");
    assert_eq!(report.day2_reminders, count, "Report: {report}");
}

#[then(expr = "'{word}' is suspended")]
async fn check_suspended(world: &mut FeeWorld, user: String) {
    let account = world.system().db.fetch_user_account(&user.into()).await.expect("Error fetching account");
    assert_eq!(account.expect("Account does not exist").account_status, AccountStatus::Suspended);
}

#[then(expr = "'{word}' is active")]
async fn check_active(world: &mut FeeWorld, user: String) {
    let account = world.system().db.fetch_user_account(&user.into()).await.expect("Error fetching account");
    assert_eq!(account.expect("Account does not exist").account_status, AccountStatus::Active);
}
