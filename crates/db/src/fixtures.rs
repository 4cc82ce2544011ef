use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use procura_core::domain::purchase::{
    ApprovalStamp, Attachment, BillType, Hub, PaymentSequence, PurchaseId, PurchaseRequest,
    PurchaseStatus, Purpose,
};

use crate::repositories::{PurchaseRepository, RepositoryError};

/// One canonical demo purchase. Amounts are in paise-free rupees.
struct SeedPurchase {
    id: &'static str,
    uploader_name: &'static str,
    vendor_name: &'static str,
    purpose: Purpose,
    amount_rupees: i64,
    bill_type: BillType,
    hub: Hub,
    payment_sequence: PaymentSequence,
    payment_date: (i32, u32, u32),
    attachment: Option<&'static str>,
    status: PurchaseStatus,
    director_approved: bool,
    finance_approved: bool,
    created_day: u32,
    description: &'static str,
}

const SEED_PURCHASES: &[SeedPurchase] = &[
    SeedPurchase {
        id: "demo-pr-001",
        uploader_name: "Asha Rao",
        vendor_name: "Kaveri Supplies",
        purpose: Purpose::Procurement,
        amount_rupees: 4_500,
        bill_type: BillType::Quantum,
        hub: Hub::Mumbai,
        payment_sequence: PaymentSequence::BillFirst,
        payment_date: (2026, 3, 10),
        attachment: Some("kaveri-invoice.pdf"),
        status: PurchaseStatus::Pending,
        director_approved: false,
        finance_approved: false,
        created_day: 5,
        description: "small request awaiting finance",
    },
    SeedPurchase {
        id: "demo-pr-002",
        uploader_name: "Ravi Kumar",
        vendor_name: "Acme Repairs",
        purpose: Purpose::Repair,
        amount_rupees: 15_000,
        bill_type: BillType::Covalent,
        hub: Hub::Delhi,
        payment_sequence: PaymentSequence::PaymentFirst,
        payment_date: (2026, 3, 12),
        attachment: Some("acme-quote.png"),
        status: PurchaseStatus::Pending,
        director_approved: false,
        finance_approved: false,
        created_day: 4,
        description: "large request awaiting director",
    },
    SeedPurchase {
        id: "demo-pr-003",
        uploader_name: "Meera Iyer",
        vendor_name: "Sharma Traders",
        purpose: Purpose::Procurement,
        amount_rupees: 25_000,
        bill_type: BillType::Quantum,
        hub: Hub::Bangalore,
        payment_sequence: PaymentSequence::BillFirst,
        payment_date: (2026, 3, 8),
        attachment: Some("sharma-bill.pdf"),
        status: PurchaseStatus::DirectorApproved,
        director_approved: true,
        finance_approved: false,
        created_day: 3,
        description: "large request cleared by director, awaiting finance",
    },
    SeedPurchase {
        id: "demo-pr-004",
        uploader_name: "Vikram Shah",
        vendor_name: "Lotus Print",
        purpose: Purpose::SmallPurchase,
        amount_rupees: 800,
        bill_type: BillType::Covalent,
        hub: Hub::Pune,
        payment_sequence: PaymentSequence::PaymentWithoutBill,
        payment_date: (2026, 3, 2),
        attachment: None,
        status: PurchaseStatus::FinanceApproved,
        director_approved: false,
        finance_approved: true,
        created_day: 2,
        description: "fast-path approval without a bill",
    },
    SeedPurchase {
        id: "demo-pr-005",
        uploader_name: "Neha Joshi",
        vendor_name: "Payroll Services",
        purpose: Purpose::Salary,
        amount_rupees: 120_000,
        bill_type: BillType::Quantum,
        hub: Hub::Mumbai,
        payment_sequence: PaymentSequence::PaymentFirst,
        payment_date: (2026, 3, 1),
        attachment: Some("payroll-march.xlsx"),
        status: PurchaseStatus::Rejected,
        director_approved: true,
        finance_approved: false,
        created_day: 1,
        description: "rejected after director sign-off",
    },
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PurchaseSeedInfo {
    pub purchase_id: &'static str,
    pub status: PurchaseStatus,
    pub inserted: bool,
    pub description: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub purchases_seeded: Vec<PurchaseSeedInfo>,
}

impl SeedResult {
    pub fn inserted_count(&self) -> usize {
        self.purchases_seeded.iter().filter(|info| info.inserted).count()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

/// Deterministic demo dataset: one purchase per status, covering both approval paths.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub fn purchases() -> Vec<PurchaseRequest> {
        SEED_PURCHASES.iter().map(SeedPurchase::to_request).collect()
    }

    /// Inserts any missing demo rows. Existing rows are left untouched, so reloading is a no-op.
    pub async fn load<R>(repository: &R) -> Result<SeedResult, RepositoryError>
    where
        R: PurchaseRepository + ?Sized,
    {
        let mut purchases_seeded = Vec::with_capacity(SEED_PURCHASES.len());
        for seed in SEED_PURCHASES {
            let inserted = repository.import(seed.to_request()).await?;
            purchases_seeded.push(PurchaseSeedInfo {
                purchase_id: seed.id,
                status: seed.status,
                inserted,
                description: seed.description,
            });
        }
        Ok(SeedResult { purchases_seeded })
    }

    /// Checks every demo row exists with its seeded status.
    pub async fn verify<R>(repository: &R) -> Result<VerificationResult, RepositoryError>
    where
        R: PurchaseRepository + ?Sized,
    {
        let mut checks = Vec::with_capacity(SEED_PURCHASES.len());
        for seed in SEED_PURCHASES {
            let stored = repository.find_by_id(&PurchaseId(seed.id.to_string())).await?;
            let matches = stored.is_some_and(|purchase| purchase.status == seed.status);
            checks.push((seed.id, matches));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

impl SeedPurchase {
    fn to_request(&self) -> PurchaseRequest {
        let created_at = seed_timestamp(self.created_day, 9);
        let (year, month, day) = self.payment_date;
        let payment_date =
            NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN);

        PurchaseRequest {
            id: PurchaseId(self.id.to_string()),
            uploader_name: self.uploader_name.to_string(),
            vendor_name: self.vendor_name.to_string(),
            purpose: self.purpose,
            amount: Decimal::new(self.amount_rupees, 0),
            bill_type: self.bill_type,
            hub: self.hub,
            payment_sequence: self.payment_sequence,
            payment_date,
            attachment: self.attachment.map(|name| Attachment {
                url: format!("https://files.example.com/purchase-files/{}/{name}", self.id),
                name: name.to_string(),
            }),
            status: self.status,
            director_approval: self
                .director_approved
                .then(|| ApprovalStamp::granted(seed_timestamp(self.created_day, 11))),
            finance_approval: self
                .finance_approved
                .then(|| ApprovalStamp::granted(seed_timestamp(self.created_day, 15))),
            created_at,
            updated_at: if self.status == PurchaseStatus::Pending {
                created_at
            } else {
                seed_timestamp(self.created_day, 16)
            },
        }
    }
}

fn seed_timestamp(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}
