//! Query compiler: validated requests in, predicate and aggregate trees out.
//!
//! Opening constraints are translated straight from a rule's bitmasks into
//! predicates over the stored flag columns, so they can be pushed into the
//! corpus scan instead of re-running the classifier per row.

use crate::{
    config::StatsConfig,
    error::{StatsResult, ValidationError},
    opening::OpeningRule,
    predicate::{Aggregate, CompareOp, Field, Predicate, Tally},
    request::{restriction, AdvancedRequest, SideSelection, StandardFilterParams},
    types::{OpeningIndex, PlayerId, Seat},
};
use serde::{Deserialize, Serialize};

/// A filter plus the named counters to evaluate over the rows it accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub filter: Predicate,
    pub aggregates: Vec<Aggregate>,
}

impl CompiledQuery {
    pub fn counter_names(&self) -> Vec<&str> {
        self.aggregates.iter().map(|a| a.name.as_str()).collect()
    }
}

fn bits(mask: u32) -> impl Iterator<Item = u8> {
    (0u8..32).filter(move |b| mask & (1u32 << b) != 0)
}

fn sum_of(fields: &[Field]) -> Tally {
    Tally::Sum(fields.to_vec())
}

pub struct QueryCompiler {
    config: StatsConfig,
}

impl QueryCompiler {
    pub fn new(config: StatsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    fn rule(&self, field: &str, id: i64) -> Result<&OpeningRule, ValidationError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.config.rules.get(index).ok())
            .ok_or_else(|| ValidationError::out_of_range(field, id))
    }

    fn opening_ids(&self, field: &str, list: &[i64]) -> Result<Vec<OpeningIndex>, ValidationError> {
        list.iter()
            .map(|id| self.rule(field, *id).map(|r| r.index))
            .collect()
    }

    // ── Shared filter ──────────────────────────────────────────────

    fn slice_filter(
        &self,
        min_elo: i64,
        max_elo: i64,
        ladders: &[i64],
        patches: &[i64],
        maps: &[i64],
        exclude_civ_mirrors: bool,
    ) -> Predicate {
        let mut terms = vec![
            Predicate::compare(Field::Rating, CompareOp::Ge, min_elo),
            Predicate::compare(Field::Rating, CompareOp::Le, max_elo),
        ];
        for (field, list) in [
            (Field::LadderId, ladders),
            (Field::Patch, patches),
            (Field::MapId, maps),
        ] {
            if let Some(values) = restriction(list) {
                terms.push(Predicate::one_of(field, values));
            }
        }
        if exclude_civ_mirrors {
            terms.push(
                Predicate::compare_fields(Field::Civ(Seat::One), CompareOp::Eq, Field::Civ(Seat::Two))
                    .negate(),
            );
        }
        Predicate::all_of(terms)
    }

    /// Rating bounds, ladder/patch/map inclusion, and the optional
    /// civilizations-differ term. Valid over match rows and summary rows;
    /// on summary rows the rating bound applies to the stored bucket and
    /// the mirror term is vacuous.
    pub fn compile_standard_filter(&self, params: &StandardFilterParams) -> Predicate {
        self.slice_filter(
            params.min_elo,
            params.max_elo,
            &params.include_ladder_ids,
            &params.include_patch_ids,
            &params.include_map_ids,
            params.exclude_mirrors,
        )
    }

    // ── Opening and side predicates ────────────────────────────────

    /// The rule's classification condition over one seat's stored flags:
    /// any inclusion group fully set, and no exclusion bit set.
    pub fn opening_predicate(&self, seat: Seat, rule: &OpeningRule) -> Predicate {
        let flag = |bit: u8, set: bool| Predicate::equals(Field::Flag { seat, bit }, set);
        // No inclusion groups renders as Or([]), which never holds.
        let inclusion = Predicate::any_of(
            rule.inclusion_groups
                .iter()
                .map(|group| Predicate::all_of(bits(*group).map(|b| flag(b, true)))),
        );
        let exclusion = Predicate::all_of(bits(rule.exclusion_mask()).map(|b| flag(b, false)));
        Predicate::all_of([inclusion, exclusion])
    }

    /// Membership of the player in `seat` on one matchup side: anchor
    /// player, then every listed opening, then any listed civilization.
    /// An unconstrained side accepts everyone.
    fn side_predicate(
        &self,
        seat: Seat,
        side: &SideSelection,
        anchor: Option<PlayerId>,
        field: &str,
    ) -> Result<Predicate, ValidationError> {
        let mut terms = Vec::new();
        if let Some(player) = anchor {
            terms.push(Predicate::equals(Field::PlayerId(seat), player));
        }
        if let Some(openings) = restriction(&side.opening_ids) {
            for id in openings {
                terms.push(self.opening_predicate(seat, self.rule(field, *id)?));
            }
        }
        if let Some(civs) = restriction(&side.civ_ids) {
            terms.push(Predicate::one_of(Field::Civ(seat), civs));
        }
        Ok(Predicate::all_of(terms))
    }

    fn side_label(&self, side: &SideSelection) -> String {
        let opening = side.opening().map(|id| {
            usize::try_from(id)
                .map(|i| self.config.rules.name(i).to_string())
                .unwrap_or_default()
        });
        match (side.civ(), opening) {
            (Some(civ), Some(opening)) => format!("{}_{opening}", self.config.civ_name(civ)),
            (Some(civ), None) => self.config.civ_name(civ),
            (None, Some(opening)) => opening,
            (None, None) => String::new(),
        }
    }

    // ── Advanced matchup requests ──────────────────────────────────

    /// Three counters (`total`, `wins`, `losses`) per constrained slot
    /// pair. A match counts when either seat assignment fits left/right;
    /// wins and losses follow the victory flag of the left-side player.
    pub fn compile_advanced_request(&self, request: &AdvancedRequest) -> StatsResult<CompiledQuery> {
        let filter = self.slice_filter(
            request.min_elo,
            request.max_elo,
            &request.include_ladder_ids,
            &request.include_patch_ids,
            &request.include_map_ids,
            request.exclude_civ_mirrors,
        );
        let anchor = (request.left_player_id != 0).then_some(request.left_player_id);

        let mut aggregates = Vec::new();
        for k in 0..request.slot_pairs() {
            let (left, right) = (&request.sides[2 * k], &request.sides[2 * k + 1]);
            if left.is_unconstrained() && right.is_unconstrained() {
                continue;
            }
            let left_field = format!("include_opening_ids_{}", 2 * k);
            let right_field = format!("include_opening_ids_{}", 2 * k + 1);

            let mut l = [Predicate::always(), Predicate::always()];
            let mut r = [Predicate::always(), Predicate::always()];
            for (i, seat) in Seat::BOTH.into_iter().enumerate() {
                l[i] = self.side_predicate(seat, left, anchor, &left_field)?;
                r[i] = self.side_predicate(seat, right, None, &right_field)?;
                if request.exclude_opening_mirrors && left.opening().is_some() {
                    let left_openings = SideSelection {
                        civ_ids: Vec::new(),
                        opening_ids: left.opening_ids.clone(),
                    };
                    let same = self.side_predicate(seat, &left_openings, None, &left_field)?;
                    r[i] = Predicate::all_of([r[i].clone(), same.negate()]);
                }
            }

            let pairing = |extra: Option<bool>| {
                let arm = |left_seat: usize, right_seat: usize, seat: Seat| {
                    let mut terms = vec![l[left_seat].clone(), r[right_seat].clone()];
                    if let Some(won) = extra {
                        terms.push(Predicate::equals(Field::Victory(seat), won));
                    }
                    Predicate::all_of(terms)
                };
                Predicate::any_of([arm(0, 1, Seat::One), arm(1, 0, Seat::Two)])
            };

            let name = format!("{}__vs__{}", self.side_label(left), self.side_label(right));
            let suffix = format!("____{}", 2 * k);
            aggregates.push(Aggregate::count(format!("{name}_total{suffix}"), pairing(None)));
            aggregates.push(Aggregate::count(format!("{name}_wins{suffix}"), pairing(Some(true))));
            aggregates.push(Aggregate::count(format!("{name}_losses{suffix}"), pairing(Some(false))));
        }
        log::debug!("Compiled advanced request into {} counters", aggregates.len());
        Ok(CompiledQuery { filter, aggregates })
    }

    // ── Summary-table compilations ─────────────────────────────────

    /// Win/loss counters per civilization over `civ_outcome` rows.
    pub fn compile_civ_win_rates(&self, params: &StandardFilterParams) -> CompiledQuery {
        let included: Vec<i64> = match restriction(&params.include_civ_ids) {
            Some(list) => list.to_vec(),
            None => self.config.civ_names.keys().copied().collect(),
        };
        let excluded = restriction(&params.exclude_civ_ids).unwrap_or(&[]);

        let mut aggregates = Vec::new();
        for civ in included.into_iter().filter(|c| !excluded.contains(c)) {
            let name = self.config.civ_name(civ);
            let this = Predicate::equals(Field::Civilization, civ);
            aggregates.push(Aggregate::sum(
                format!("{name}_total"),
                vec![(this.clone(), sum_of(&[Field::Victories, Field::Losses]))],
            ));
            aggregates.push(Aggregate::sum(
                format!("{name}_wins"),
                vec![(this.clone(), sum_of(&[Field::Victories]))],
            ));
            aggregates.push(Aggregate::sum(
                format!("{name}_losses"),
                vec![(this, sum_of(&[Field::Losses]))],
            ));
        }
        CompiledQuery {
            filter: self.compile_standard_filter(params),
            aggregates,
        }
    }

    /// True when the opening in `field` is a basic strategy or one of the
    /// two reserved trailing rules. A partner outside this range is a
    /// follow-up of some basic strategy and would count twice.
    fn basic_or_reserved(&self, field: Field) -> Predicate {
        let rules = &self.config.rules;
        Predicate::any_of([
            Predicate::compare(field, CompareOp::Lt, rules.basic_count as i64),
            Predicate::compare(field, CompareOp::Ge, rules.fast_castle_index() as i64),
        ])
    }

    /// Per-opening win/loss counters over `opening_matchup_outcome` rows,
    /// with contaminated partners excluded. Opening mirrors count both
    /// players in the total and neither in wins or losses.
    pub fn compile_basic_strategies(&self, params: &StandardFilterParams) -> StatsResult<CompiledQuery> {
        let rules = &self.config.rules;
        let strategies: Vec<OpeningIndex> = match restriction(&params.include_opening_ids) {
            Some(list) => self.opening_ids("include_opening_ids", list)?,
            None => (0..rules.len()).collect(),
        };
        let (o1, o2) = (Field::Opening1, Field::Opening2);
        let one_side = [Field::Opening1Victories, Field::Opening1Losses];
        let other_side = [Field::Opening2Victories, Field::Opening2Losses];

        let mut aggregates = vec![Aggregate::sum(
            "total",
            vec![(
                Predicate::all_of([self.basic_or_reserved(o1), self.basic_or_reserved(o2)]),
                sum_of(&one_side),
            )],
        )];
        for id in strategies {
            let name = rules.name(id);
            let is = |f: Field| Predicate::equals(f, id as i64);
            let mirror = Predicate::all_of([is(o1), is(o2)]);
            let as_first = Predicate::all_of([is(o1), self.basic_or_reserved(o2)]);
            let as_second = Predicate::all_of([is(o2), self.basic_or_reserved(o1)]);

            aggregates.push(Aggregate::sum(
                format!("{name}_total"),
                vec![
                    (mirror.clone(), sum_of(&[one_side, other_side].concat())),
                    (as_first.clone(), sum_of(&one_side)),
                    (as_second.clone(), sum_of(&other_side)),
                ],
            ));
            aggregates.push(Aggregate::sum(
                format!("{name}_wins"),
                vec![
                    (mirror.clone(), Tally::Zero),
                    (as_first.clone(), sum_of(&[Field::Opening1Victories])),
                    (as_second.clone(), sum_of(&[Field::Opening2Victories])),
                ],
            ));
            aggregates.push(Aggregate::sum(
                format!("{name}_losses"),
                vec![
                    (mirror, Tally::Zero),
                    (as_first, sum_of(&[Field::Opening1Losses])),
                    (as_second, sum_of(&[Field::Opening2Losses])),
                ],
            ));
        }
        Ok(CompiledQuery {
            filter: self.compile_standard_filter(params),
            aggregates,
        })
    }

    /// Head-to-head grid over every unordered pair of strategies, read from
    /// the canonical lower-first storage in either direction.
    pub fn compile_opening_matchups(&self, params: &StandardFilterParams) -> StatsResult<CompiledQuery> {
        let rules = &self.config.rules;
        let strategies: Vec<OpeningIndex> = match restriction(&params.include_opening_ids) {
            Some(list) => self.opening_ids("include_opening_ids", list)?,
            None => (0..rules.basic_count).collect(),
        };
        let (o1, o2) = (Field::Opening1, Field::Opening2);
        let basic = rules.basic_count as i64;

        let mut aggregates = vec![Aggregate::sum(
            "total",
            vec![(
                Predicate::all_of([
                    Predicate::compare(o1, CompareOp::Lt, basic),
                    Predicate::compare(o2, CompareOp::Lt, basic),
                ]),
                sum_of(&[Field::Opening1Victories, Field::Opening1Losses]),
            )],
        )];
        for (pos, &i) in strategies.iter().enumerate() {
            for &j in &strategies[pos..] {
                let name = format!("{}_vs_{}", rules.name(i), rules.name(j));
                let forward = Predicate::all_of([
                    Predicate::equals(o1, i as i64),
                    Predicate::equals(o2, j as i64),
                ]);
                let reverse = Predicate::all_of([
                    Predicate::equals(o2, i as i64),
                    Predicate::equals(o1, j as i64),
                ]);
                let counter = |suffix: &str, first: &[Field], second: &[Field]| {
                    let mut cases = vec![(forward.clone(), sum_of(first))];
                    if i != j {
                        cases.push((reverse.clone(), sum_of(second)));
                    }
                    Aggregate::sum(format!("{name}_{suffix}"), cases)
                };
                aggregates.push(counter(
                    "total",
                    &[Field::Opening1Victories, Field::Opening1Losses],
                    &[Field::Opening2Victories, Field::Opening2Losses],
                ));
                aggregates.push(counter("wins", &[Field::Opening1Victories], &[Field::Opening2Victories]));
                aggregates.push(counter("losses", &[Field::Opening1Losses], &[Field::Opening2Losses]));
            }
        }
        Ok(CompiledQuery {
            filter: self.compile_standard_filter(params),
            aggregates,
        })
    }

    /// Filter over `opening_tech_stat` rows for tech timing lookups.
    pub fn compile_tech_filter(&self, params: &StandardFilterParams) -> StatsResult<Predicate> {
        let mut terms = vec![self.compile_standard_filter(params)];
        if let Some(list) = restriction(&params.include_opening_ids) {
            let ids: Vec<i64> = self
                .opening_ids("include_opening_ids", list)?
                .into_iter()
                .map(|i| i as i64)
                .collect();
            terms.push(Predicate::one_of(Field::Opening, &ids));
        }
        if let Some(list) = restriction(&params.include_tech_ids) {
            terms.push(Predicate::one_of(Field::Tech, list));
        }
        Ok(Predicate::all_of(terms))
    }

    /// Per-player total/wins/losses over raw match rows.
    pub fn compile_player_record(&self, params: &StandardFilterParams) -> CompiledQuery {
        let mut aggregates = Vec::new();
        let mut player_terms = Vec::new();
        for &player in restriction(&params.include_player_ids).unwrap_or(&[]) {
            let seated = |seat: Seat| Predicate::equals(Field::PlayerId(seat), player);
            let outcome = |won: bool| {
                Predicate::any_of(Seat::BOTH.map(|seat| {
                    Predicate::all_of([seated(seat), Predicate::equals(Field::Victory(seat), won)])
                }))
            };
            let played = Predicate::any_of(Seat::BOTH.map(seated));
            aggregates.push(Aggregate::count(format!("player_{player}_total"), played.clone()));
            aggregates.push(Aggregate::count(format!("player_{player}_wins"), outcome(true)));
            aggregates.push(Aggregate::count(format!("player_{player}_losses"), outcome(false)));
            player_terms.push(played);
        }
        CompiledQuery {
            filter: Predicate::all_of([
                self.compile_standard_filter(params),
                Predicate::any_of(player_terms),
            ]),
            aggregates,
        }
    }
}
