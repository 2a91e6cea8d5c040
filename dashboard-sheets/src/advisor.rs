//! Recommendation and highlight sentences derived from aggregated totals.
//!
//! Both lists are ordered sets of independent rules. A rule looks at the
//! [`AdvisorContext`] and contributes at most one sentence.

use dashboard_core::{
    format_count, format_percent, AdvisorThresholds, DistributionEntry, NumbersSummaryRow,
    ProviderLeader, Totals,
};

/// Everything the rules may consult.
#[derive(Debug, Clone, Copy)]
pub struct AdvisorContext<'a> {
    pub totals: &'a Totals,
    pub thresholds: &'a AdvisorThresholds,
    pub window_days: u32,
    /// Territory with the most leads waiting for a therapist.
    pub top_pending_area: Option<&'a NumbersSummaryRow>,
    /// Territory with the most insurance issues.
    pub top_insurance_area: Option<&'a NumbersSummaryRow>,
    pub provider_leaders: &'a [ProviderLeader],
    pub area_distribution: &'a [DistributionEntry],
    pub insurance_distribution: &'a [DistributionEntry],
    pub territory_count: usize,
}

impl AdvisorContext<'_> {
    fn visit_delta(&self) -> i64 {
        self.totals.appointments_last_30 as i64 - self.totals.appointments_prev_30 as i64
    }
}

/// A named predicate that may emit one sentence.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    evaluate: fn(&AdvisorContext<'_>) -> Option<String>,
}

impl Rule {
    pub fn evaluate(&self, context: &AdvisorContext<'_>) -> Option<String> {
        (self.evaluate)(context)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

pub const RECOMMENDATION_RULES: [Rule; 8] = [
    Rule {
        name: "reassign_pt_bandwidth",
        evaluate: reassign_pt_bandwidth,
    },
    Rule {
        name: "accelerate_intake",
        evaluate: accelerate_intake,
    },
    Rule {
        name: "resolve_insurance_blocks",
        evaluate: resolve_insurance_blocks,
    },
    Rule {
        name: "tighten_reminders",
        evaluate: tighten_reminders,
    },
    Rule {
        name: "review_cancellations",
        evaluate: review_cancellations,
    },
    Rule {
        name: "close_documentation",
        evaluate: close_documentation,
    },
    Rule {
        name: "rebuild_scheduling",
        evaluate: rebuild_scheduling,
    },
    Rule {
        name: "balance_caseload",
        evaluate: balance_caseload,
    },
];

pub const HIGHLIGHT_RULES: [Rule; 6] = [
    Rule {
        name: "top_provider",
        evaluate: top_provider,
    },
    Rule {
        name: "top_payer",
        evaluate: top_payer,
    },
    Rule {
        name: "average_lead_load",
        evaluate: average_lead_load,
    },
    Rule {
        name: "visit_volume",
        evaluate: visit_volume,
    },
    Rule {
        name: "new_patient_velocity",
        evaluate: new_patient_velocity,
    },
    Rule {
        name: "cancellation_watch",
        evaluate: cancellation_watch,
    },
];

fn run(rules: &[Rule], context: &AdvisorContext<'_>) -> Vec<String> {
    rules.iter().filter_map(|rule| rule.evaluate(context)).collect()
}

/// Action items in rule order, or a single "stable" message when none apply.
pub fn recommendations(context: &AdvisorContext<'_>) -> Vec<String> {
    let mut recs = run(&RECOMMENDATION_RULES, context);
    if recs.is_empty() {
        if let Some(largest) = context.area_distribution.first() {
            recs.push(format!(
                "Pipeline is stable; {} holds the largest active census at {} patients.",
                largest.name,
                format_count(largest.count as f64)
            ));
        }
    }
    recs
}

/// Informational sentences; visit volume and new patient velocity always appear.
pub fn highlights(context: &AdvisorContext<'_>) -> Vec<String> {
    run(&HIGHLIGHT_RULES, context)
}

fn reassign_pt_bandwidth(context: &AdvisorContext<'_>) -> Option<String> {
    let area = context.top_pending_area.filter(|area| area.pending_pt > 0.0)?;
    Some(format!(
        "Reassign PT bandwidth to {}: {} leads are still waiting for coverage.",
        area.area,
        format_count(area.pending_pt)
    ))
}

fn accelerate_intake(context: &AdvisorContext<'_>) -> Option<String> {
    let ratio = context.totals.pending_ratio();
    (ratio > context.thresholds.pending_ratio).then(|| {
        format!(
            "Accelerate intake-to-PT handoff; {} of pipeline leads remain unassigned.",
            format_percent(ratio)
        )
    })
}

fn resolve_insurance_blocks(context: &AdvisorContext<'_>) -> Option<String> {
    let issues = context.totals.total_insurance_issues;
    if issues <= 0.0 {
        return None;
    }
    let focus = context
        .top_insurance_area
        .map(|area| area.area.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("priority territories");
    Some(format!(
        "Coordinate with payer relations to resolve {} insurance blocks (highest in {focus}).",
        format_count(issues)
    ))
}

fn tighten_reminders(context: &AdvisorContext<'_>) -> Option<String> {
    let attendance = context.totals.recent_attendance();
    (attendance > 0.0 && attendance < context.thresholds.attendance_floor).then(|| {
        format!(
            "Tighten reminder cadence; attendance is {} vs. goal of {} or better.",
            format_percent(attendance),
            format_percent(context.thresholds.attendance_goal)
        )
    })
}

fn review_cancellations(context: &AdvisorContext<'_>) -> Option<String> {
    let rate = context.totals.cancellation_rate;
    (rate > context.thresholds.cancellation_rate).then(|| {
        format!(
            "Review cancellation causes; rate stands at {} this period.",
            format_percent(rate)
        )
    })
}

fn close_documentation(context: &AdvisorContext<'_>) -> Option<String> {
    let pending = context.totals.docs_pending;
    (pending > 0).then(|| {
        format!(
            "Close out {} documentation items to protect reimbursement timelines.",
            format_count(pending as f64)
        )
    })
}

fn rebuild_scheduling(context: &AdvisorContext<'_>) -> Option<String> {
    let delta = context.visit_delta();
    (delta < 0).then(|| {
        format!(
            "Rebuild scheduling velocity; visits are down {} vs. the prior {} days.",
            format_count(delta.unsigned_abs() as f64),
            context.window_days
        )
    })
}

fn balance_caseload(context: &AdvisorContext<'_>) -> Option<String> {
    let [leader, runner_up, ..] = context.provider_leaders else {
        return None;
    };
    let dominant =
        leader.count as f64 >= runner_up.count as f64 * context.thresholds.provider_dominance;
    dominant.then(|| {
        format!(
            "Balance caseload: {} is carrying {} recent visits, far outpacing peers.",
            leader.provider,
            format_count(leader.count as f64)
        )
    })
}

fn top_provider(context: &AdvisorContext<'_>) -> Option<String> {
    let leader = context.provider_leaders.first()?;
    Some(format!(
        "{} is leading visit volume with {} logged encounters.",
        leader.provider,
        format_count(leader.count as f64)
    ))
}

fn top_payer(context: &AdvisorContext<'_>) -> Option<String> {
    let payer = context.insurance_distribution.first()?;
    Some(format!(
        "{} remains the dominant payer across the active census.",
        payer.name
    ))
}

fn average_lead_load(context: &AdvisorContext<'_>) -> Option<String> {
    if context.territory_count == 0 {
        return None;
    }
    let average = context.totals.total_leads / context.territory_count as f64;
    Some(format!(
        "Average lead load per territory is {}, guiding staffing benchmarks.",
        format_count(average)
    ))
}

fn visit_volume(context: &AdvisorContext<'_>) -> Option<String> {
    let delta = context.visit_delta();
    let sentence = match delta {
        0 => "Visit volume held flat compared to the prior month.".to_string(),
        _ => format!(
            "Visit volume {} by {} compared to the prior month.",
            if delta > 0 { "grew" } else { "fell" },
            format_count(delta.unsigned_abs() as f64)
        ),
    };
    Some(sentence)
}

fn new_patient_velocity(context: &AdvisorContext<'_>) -> Option<String> {
    Some(format!(
        "New patient velocity is {} starts over the last {} days.",
        format_count(context.totals.new_patients_last_30 as f64),
        context.window_days
    ))
}

fn cancellation_watch(context: &AdvisorContext<'_>) -> Option<String> {
    let rate = context.totals.cancellation_rate;
    (rate > 0.0).then(|| {
        format!(
            "Cancellation rate is running at {}; continue tracking root causes.",
            format_percent(rate)
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        totals: Totals,
        thresholds: AdvisorThresholds,
        numbers: Vec<NumbersSummaryRow>,
        leaders: Vec<ProviderLeader>,
        areas: Vec<DistributionEntry>,
        payers: Vec<DistributionEntry>,
    }

    impl Fixture {
        fn new(totals: Totals) -> Self {
            Self {
                totals,
                thresholds: AdvisorThresholds::default(),
                numbers: Vec::new(),
                leaders: Vec::new(),
                areas: Vec::new(),
                payers: Vec::new(),
            }
        }

        fn context(&self) -> AdvisorContext<'_> {
            AdvisorContext {
                totals: &self.totals,
                thresholds: &self.thresholds,
                window_days: 30,
                top_pending_area: None,
                top_insurance_area: None,
                provider_leaders: &self.leaders,
                area_distribution: &self.areas,
                insurance_distribution: &self.payers,
                territory_count: self.numbers.len(),
            }
        }
    }

    fn leader(name: &str, count: usize) -> ProviderLeader {
        ProviderLeader {
            provider: name.to_string(),
            provider_key: name.to_lowercase(),
            count,
        }
    }

    fn fires(rule: fn(&AdvisorContext<'_>) -> Option<String>, fixture: &Fixture) -> bool {
        rule(&fixture.context()).is_some()
    }

    #[test]
    fn pending_ratio_threshold_is_strict() {
        let above = Fixture::new(Totals {
            total_leads: 100.0,
            total_pending_pt: 26.0,
            ..Totals::default()
        });
        let at = Fixture::new(Totals {
            total_leads: 100.0,
            total_pending_pt: 25.0,
            ..Totals::default()
        });

        let message = accelerate_intake(&above.context()).expect("26% should fire");
        assert!(message.contains("26%"));
        assert!(!fires(accelerate_intake, &at));
    }

    #[test]
    fn attendance_rule_ignores_empty_schedules() {
        let empty = Fixture::new(Totals::default());
        assert!(!fires(tighten_reminders, &empty));

        let low = Fixture::new(Totals {
            attendance_last_30: 0.8,
            ..Totals::default()
        });
        assert!(fires(tighten_reminders, &low));

        let healthy = Fixture::new(Totals {
            attendance_last_30: 0.87,
            ..Totals::default()
        });
        assert!(!fires(tighten_reminders, &healthy));
    }

    #[test]
    fn caseload_balance_needs_a_dominant_leader() {
        let mut fixture = Fixture::new(Totals::default());
        fixture.leaders = vec![leader("Dr. Kim", 16), leader("Dr. Ode", 10)];
        assert!(fires(balance_caseload, &fixture));

        fixture.leaders = vec![leader("Dr. Kim", 15), leader("Dr. Ode", 10)];
        assert!(!fires(balance_caseload, &fixture));

        fixture.leaders = vec![leader("Dr. Kim", 15)];
        assert!(!fires(balance_caseload, &fixture));
    }

    #[test]
    fn declining_visits_are_flagged() {
        let fixture = Fixture::new(Totals {
            appointments_last_30: 8,
            appointments_prev_30: 11,
            ..Totals::default()
        });
        let message = rebuild_scheduling(&fixture.context()).expect("decline fires");
        assert!(message.contains("down 3"));
    }

    #[test]
    fn fallback_cites_largest_area_when_nothing_fires() {
        let mut fixture = Fixture::new(Totals::default());
        fixture.areas = vec![DistributionEntry {
            name: "West".to_string(),
            count: 42,
        }];

        let recs = recommendations(&fixture.context());
        assert_eq!(
            recs,
            vec!["Pipeline is stable; West holds the largest active census at 42 patients."]
        );
    }

    #[test]
    fn rules_append_in_declared_order() {
        let mut fixture = Fixture::new(Totals {
            total_leads: 10.0,
            total_pending_pt: 5.0,
            total_insurance_issues: 2.0,
            docs_pending: 1,
            ..Totals::default()
        });
        fixture.areas = vec![DistributionEntry {
            name: "West".to_string(),
            count: 1,
        }];

        let recs = recommendations(&fixture.context());
        assert_eq!(recs.len(), 3);
        assert!(recs[0].starts_with("Accelerate intake"));
        assert!(recs[1].contains("priority territories"));
        assert!(recs[2].starts_with("Close out 1"));
    }

    #[test]
    fn highlights_always_report_volume_and_velocity() {
        let fixture = Fixture::new(Totals::default());
        let notes = highlights(&fixture.context());
        assert_eq!(
            notes,
            vec![
                "Visit volume held flat compared to the prior month.",
                "New patient velocity is 0 starts over the last 30 days.",
            ]
        );
    }
}
