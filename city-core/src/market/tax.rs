// Monthly taxation of accumulated consumption revenue

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct TaxEvent {
    pub tax_amount: f64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxLedger {
    pub rate: f64,
    /// Spending accumulated since the last collection
    pub revenue: f64,
    pub total_collected: f64,
    last_month: Option<u32>,
}

impl TaxLedger {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            revenue: 0.0,
            total_collected: 0.0,
            last_month: None,
        }
    }

    pub fn record(&mut self, spending: f64) {
        if spending > 0.0 {
            self.revenue += spending;
        }
    }

    /// Collect `floor(revenue * rate)` and reset revenue.
    pub fn process_monthly_tax(&mut self) -> TaxEvent {
        let revenue = self.revenue;
        let tax_amount = (revenue * self.rate).floor().max(0.0);
        self.revenue = 0.0;
        self.total_collected += tax_amount;
        TaxEvent {
            tax_amount,
            revenue,
        }
    }

    /// Feed the current game month. The first observation only sets the
    /// baseline; every later change of month collects tax once.
    pub fn observe_month(&mut self, month: u32) -> Option<TaxEvent> {
        match self.last_month.replace(month) {
            Some(previous) if previous != month => Some(self.process_monthly_tax()),
            _ => None,
        }
    }
}
