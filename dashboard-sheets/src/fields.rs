//! Canonical spreadsheet fields and the header spellings accepted for each.

use std::fmt;
use std::str::FromStr;

/// Semantic column identity, independent of how a sheet owner titled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    PatientId,
    Status,
    FirstName,
    LastName,
    Birthdate,
    Address,
    City,
    PostalCode,
    Therapist,
    Phone,
    Area,
    FollowUp,
    ReferredBy,
    LostReason,
    BookingSource,
    LeadSource,
    Insurance1,
    Insurance2,
    InsuranceStatus1,
    InsuranceStatus2,
    Authorization,
    EmrId,
    NewPatientSource,
    PhysicianId,
    PreferredDays,
    EarliestTime,
    LatestTime,
    AppointmentDate,
    AppointmentProvider,
    AppointmentStatus,
    AppointmentType,
    AppointmentNoteDone,
    NumberTotalLeads,
    NumberPendingPt,
    NumberInsuranceIssues,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 35] = [
        Self::PatientId,
        Self::Status,
        Self::FirstName,
        Self::LastName,
        Self::Birthdate,
        Self::Address,
        Self::City,
        Self::PostalCode,
        Self::Therapist,
        Self::Phone,
        Self::Area,
        Self::FollowUp,
        Self::ReferredBy,
        Self::LostReason,
        Self::BookingSource,
        Self::LeadSource,
        Self::Insurance1,
        Self::Insurance2,
        Self::InsuranceStatus1,
        Self::InsuranceStatus2,
        Self::Authorization,
        Self::EmrId,
        Self::NewPatientSource,
        Self::PhysicianId,
        Self::PreferredDays,
        Self::EarliestTime,
        Self::LatestTime,
        Self::AppointmentDate,
        Self::AppointmentProvider,
        Self::AppointmentStatus,
        Self::AppointmentType,
        Self::AppointmentNoteDone,
        Self::NumberTotalLeads,
        Self::NumberPendingPt,
        Self::NumberInsuranceIssues,
    ];

    /// Accepted header spellings, most specific first. Matching ignores case,
    /// whitespace and punctuation.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::PatientId => &["patient id", "patientid", "id"],
            Self::Status => &["status", "patient status"],
            Self::FirstName => &["first name", "firstname", "name first"],
            Self::LastName => &["last name", "lastname", "name last"],
            Self::Birthdate => &["birthdate", "dob", "date of birth"],
            Self::Address => &["primary address", "address", "street"],
            Self::City => &["primary address city", "city"],
            Self::PostalCode => &["primary address postalcode", "zip", "postal code"],
            Self::Therapist => &["pt", "therapist", "provider", "provider name"],
            Self::Phone => &["mobile", "phone", "contact", "cell"],
            Self::Area => &["area", "zone", "territory"],
            Self::FollowUp => &[
                "latest follow-up action taken",
                "latest follow up",
                "last action",
            ],
            Self::ReferredBy => &["referred by", "referrer"],
            Self::LostReason => &["lost reason"],
            Self::BookingSource => &["booking source"],
            Self::LeadSource => &["source of lead", "lead source"],
            Self::Insurance1 => &["insurance 1", "primary insurance"],
            Self::Insurance2 => &["insurance 2", "secondary insurance"],
            Self::InsuranceStatus1 => &["insurance status 1"],
            Self::InsuranceStatus2 => &["insurance status 2"],
            // The misspelling is what the live sheet uses.
            Self::Authorization => &["authroization", "authorization"],
            Self::EmrId => &["emr id"],
            Self::NewPatientSource => &["new patient source"],
            Self::PhysicianId => &["physician id"],
            Self::PreferredDays => &["preferred days"],
            Self::EarliestTime => &["earliest time"],
            Self::LatestTime => &["latest time"],
            Self::AppointmentDate => &["date of appointment", "appointment date"],
            Self::AppointmentProvider => &["provider id", "provider"],
            Self::AppointmentStatus => &["status", "appointment status"],
            Self::AppointmentType => &["type", "appointment type"],
            Self::AppointmentNoteDone => &["note done", "documentation complete"],
            Self::NumberTotalLeads => &["total leads"],
            Self::NumberPendingPt => &["pending pt", "pending therapist", "open pt"],
            Self::NumberInsuranceIssues => &["insurance not accepted", "insurance issues"],
        }
    }

    /// camelCase key used by the dashboard front end.
    pub fn key(self) -> &'static str {
        match self {
            Self::PatientId => "patientId",
            Self::Status => "status",
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Birthdate => "birthdate",
            Self::Address => "address",
            Self::City => "city",
            Self::PostalCode => "postalCode",
            Self::Therapist => "therapist",
            Self::Phone => "phone",
            Self::Area => "area",
            Self::FollowUp => "followUp",
            Self::ReferredBy => "referredBy",
            Self::LostReason => "lostReason",
            Self::BookingSource => "bookingSource",
            Self::LeadSource => "leadSource",
            Self::Insurance1 => "insurance1",
            Self::Insurance2 => "insurance2",
            Self::InsuranceStatus1 => "insuranceStatus1",
            Self::InsuranceStatus2 => "insuranceStatus2",
            Self::Authorization => "authorization",
            Self::EmrId => "emrId",
            Self::NewPatientSource => "newPatientSource",
            Self::PhysicianId => "physicianId",
            Self::PreferredDays => "preferredDays",
            Self::EarliestTime => "earliestTime",
            Self::LatestTime => "latestTime",
            Self::AppointmentDate => "appointmentDate",
            Self::AppointmentProvider => "appointmentProvider",
            Self::AppointmentStatus => "appointmentStatus",
            Self::AppointmentType => "appointmentType",
            Self::AppointmentNoteDone => "appointmentNoteDone",
            Self::NumberTotalLeads => "numberTotalLeads",
            Self::NumberPendingPt => "numberPendingPt",
            Self::NumberInsuranceIssues => "numberInsuranceIssues",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CanonicalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.key() == s)
            .ok_or_else(|| format!("Unknown canonical field {s}"))
    }
}
