use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::plan::CurrentPlan;
use crate::domain::recommendation::{CostProjection, SwitchRationale, SwitchingAnalysis};

/// Breakeven analysis of leaving the current contract for a candidate.
#[derive(Clone, Debug, Default)]
pub struct SwitchingAdvisor;

impl SwitchingAdvisor {
    pub fn analyze(
        &self,
        current: &CurrentPlan,
        current_projection: &CostProjection,
        candidate_projection: &CostProjection,
        as_of: NaiveDate,
    ) -> SwitchingAnalysis {
        let monthly_savings = current_projection.monthly_cost - candidate_projection.monthly_cost;
        let remaining_contract_months = current
            .contract_end_date
            .map(|end| remaining_contract_months(end, as_of))
            .unwrap_or(0);

        if monthly_savings <= Decimal::ZERO {
            return SwitchingAnalysis {
                recommend_switch: false,
                monthly_savings,
                months_to_breakeven: None,
                remaining_contract_months,
                switch_window_months: None,
                rationale: SwitchRationale::NoSavings,
            };
        }

        // An overflowing quotient means the fee is never recovered.
        let breakeven = current.early_termination_fee.checked_div(monthly_savings);
        let months_to_breakeven = breakeven.and_then(|months| months.to_f64());

        let (recommend_switch, rationale) = match breakeven {
            _ if remaining_contract_months == 0 => (true, SwitchRationale::NoPenaltyWindow),
            Some(months) if months <= Decimal::from(remaining_contract_months) => {
                (true, SwitchRationale::BreakevenBeforeContractEnd)
            }
            _ => (false, SwitchRationale::WaitForContractEnd),
        };

        SwitchingAnalysis {
            recommend_switch,
            monthly_savings,
            months_to_breakeven,
            remaining_contract_months,
            switch_window_months: (!recommend_switch).then_some(remaining_contract_months),
            rationale,
        }
    }
}

/// Months from `as_of` until `end`, counting a started final month as a full one.
///
/// Zero only when the contract has already ended; a live contract always has at
/// least one month left in which its termination fee applies.
pub fn remaining_contract_months(end: NaiveDate, as_of: NaiveDate) -> u32 {
    if end <= as_of {
        return 0;
    }

    let mut months = (end.year() - as_of.year()) * 12 + end.month() as i32 - as_of.month() as i32;
    if end.day() > as_of.day() {
        months += 1;
    }
    u32::try_from(months).unwrap_or(0).max(1)
}
