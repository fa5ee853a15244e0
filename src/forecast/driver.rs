use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::dataset::HistoryStore;
use crate::error::ForecastError;
use crate::forecast::buffer::FeatureBuffer;
use crate::forecast::predictor::{PredictionStep, StepPredictor};
use crate::forecast::synthesizer::synthesize_next;

/// One forecast request, already parsed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForecastRequest {
    pub entity: String,
    pub start_date: NaiveDate,
    pub days: usize,
}

/// Bounds applied to every request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForecastLimits {
    /// Largest accepted horizon
    pub max_days: usize,
    /// Largest number of discarded days between history and the start date
    pub max_catch_up_days: usize,
}

impl Default for ForecastLimits {
    fn default() -> Self {
        ForecastLimits { max_days: 30, max_catch_up_days: 366 }
    }
}

/// Where the loop starts and how much of it the caller sees.
///
/// The loop always starts the day after the newest record before the
/// requested start date. When that leaves a gap, the first `skip` steps are
/// catch-up predictions and are dropped from the result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForecastPlan {
    pub first_date: NaiveDate,
    pub skip: usize,
    pub total: usize,
}

enum RunState {
    Initializing,
    Stepping { buffer: FeatureBuffer, index: usize },
    Done,
    Failed(ForecastError),
}

/// Runs the autoregressive loop for one request:
/// predict from the window, synthesize the next record from the prediction,
/// slide the window, repeat until the horizon is covered.
///
/// A failure at any step aborts the whole forecast.
pub struct ForecastDriver<'a, P: StepPredictor + ?Sized> {
    predictor: &'a P,
    history: &'a HistoryStore,
    limits: ForecastLimits,
}

impl<'a, P: StepPredictor + ?Sized> ForecastDriver<'a, P> {
    pub fn new(predictor: &'a P, history: &'a HistoryStore) -> Self {
        ForecastDriver { predictor, history, limits: ForecastLimits::default() }
    }

    pub fn with_limits(mut self, limits: ForecastLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Validates the request and works out the catch-up distance
    pub fn plan(&self, request: &ForecastRequest) -> Result<ForecastPlan, ForecastError> {
        if request.days == 0 || request.days > self.limits.max_days {
            return Err(ForecastError::InvalidRequest(format!(
                "forecast_days must be between 1 and {}, got {}",
                self.limits.max_days, request.days
            )));
        }
        if !self.predictor.knows_entity(&request.entity) {
            return Err(ForecastError::UnknownEntity(request.entity.clone()));
        }

        let records = self.history.records(&request.entity).unwrap_or(&[]);
        let end = records.partition_point(|record| record.date < request.start_date);
        let first_date = match end {
            0 => request.start_date,
            _ => records[end - 1].date.succ_opt().ok_or_else(|| {
                ForecastError::InvalidRequest(format!("no day follows {}", records[end - 1].date))
            })?,
        };

        let skip = request.start_date.signed_duration_since(first_date).num_days().max(0) as usize;
        if skip > self.limits.max_catch_up_days {
            return Err(ForecastError::InvalidRequest(format!(
                "start_date {} is {} days past the available history; at most {} are allowed",
                request.start_date, skip, self.limits.max_catch_up_days
            )));
        }

        Ok(ForecastPlan { first_date, skip, total: skip + request.days })
    }

    /// Forecasts `request.days` consecutive days starting at `request.start_date`
    pub fn forecast(&self, request: &ForecastRequest) -> Result<Vec<PredictionStep>, ForecastError> {
        let plan = self.plan(request)?;
        if plan.skip > 0 {
            debug!(
                entity = %request.entity,
                from = %plan.first_date,
                days = plan.skip,
                "catching up to start date"
            );
        }

        let mut steps = Vec::with_capacity(plan.total);
        let mut state = RunState::Initializing;
        loop {
            state = match state {
                RunState::Initializing => match self.initialize(request, &plan) {
                    Ok(buffer) => RunState::Stepping { buffer, index: 0 },
                    Err(e) => RunState::Failed(e),
                },
                RunState::Stepping { buffer, index } => {
                    match self.step(&request.entity, buffer, index, &plan, &mut steps) {
                        Ok(next) => next,
                        Err(e) => RunState::Failed(e),
                    }
                }
                RunState::Done => {
                    let requested = steps.split_off(plan.skip);
                    debug_assert_eq!(requested.first().map(|s| s.date), Some(request.start_date));
                    return Ok(requested);
                }
                RunState::Failed(e) => {
                    warn!(entity = %request.entity, start_date = %request.start_date, "forecast failed: {}", e);
                    return Err(e);
                }
            };
        }
    }

    fn initialize(&self, request: &ForecastRequest, plan: &ForecastPlan) -> Result<FeatureBuffer, ForecastError> {
        let records = self.history.records(&request.entity).unwrap_or(&[]);
        FeatureBuffer::initialize(&request.entity, records, plan.first_date, self.predictor.window_len()).map_err(
            |e| match e {
                ForecastError::InsufficientHistory { entity, required, found, .. } => {
                    ForecastError::InsufficientHistory { entity, before: request.start_date, required, found }
                }
                other => other,
            },
        )
    }

    fn step(
        &self,
        entity: &str,
        mut buffer: FeatureBuffer,
        index: usize,
        plan: &ForecastPlan,
        steps: &mut Vec<PredictionStep>,
    ) -> Result<RunState, ForecastError> {
        let features = self.predictor.features();
        let newest = buffer.newest().date;
        let date = newest
            .succ_opt()
            .ok_or_else(|| ForecastError::InvalidRequest(format!("no day follows {}", newest)))?;

        let window = buffer.to_matrix(features)?;
        let values = self.predictor.predict(entity, &window)?;
        let step = PredictionStep::new(entity, date, values);
        debug!(
            entity,
            %date,
            index,
            catch_up = index < plan.skip,
            temp = step.temp,
            humidity = step.humidity,
            "forecast step"
        );

        if index + 1 == plan.total {
            steps.push(step);
            return Ok(RunState::Done);
        }

        let next = synthesize_next(buffer.newest(), &step, features)?;
        buffer.slide(next)?;
        steps.push(step);
        Ok(RunState::Stepping { buffer, index: index + 1 })
    }
}
