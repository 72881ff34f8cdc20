pub use crate::config::*;

use std::collections::BTreeMap;

/// A builder for assembling a council and its electoral history.
///
/// ```
/// use council_projection::builder::CouncilBuilder;
/// use council_projection::{ElectionCycle, ProjectionErrors};
///
/// let mut builder = CouncilBuilder::new("Testshire").cycle(ElectionCycle::AllOut);
/// builder.add_ward("Abbey", 2, Some(6500))?;
/// builder.add_holder("Abbey", "Jo Bloggs", "Green")?;
/// builder.add_result_simple("Abbey", 2022, &[("Green", 1100), ("Labour", 950)])?;
///
/// let council = builder.build()?;
/// assert_eq!(council.total_seats(), 2);
/// # Ok::<(), ProjectionErrors>(())
/// ```
pub struct CouncilBuilder {
    pub(crate) _name: String,
    pub(crate) _cycle: ElectionCycle,
    pub(crate) _wards: BTreeMap<String, Ward>,
    pub(crate) _next: Option<NextElection>,
    pub(crate) _declared_total_seats: Option<u32>,
}

impl CouncilBuilder {
    pub fn new(name: &str) -> CouncilBuilder {
        CouncilBuilder {
            _name: name.to_string(),
            _cycle: ElectionCycle::AllOut,
            _wards: BTreeMap::new(),
            _next: None,
            _declared_total_seats: None,
        }
    }

    pub fn cycle(self, cycle: ElectionCycle) -> CouncilBuilder {
        CouncilBuilder {
            _cycle: cycle,
            ..self
        }
    }

    pub fn declared_total_seats(self, seats: Option<u32>) -> CouncilBuilder {
        CouncilBuilder {
            _declared_total_seats: seats,
            ..self
        }
    }

    pub fn add_ward(
        &mut self,
        name: &str,
        seats: u32,
        electorate: Option<u64>,
    ) -> Result<(), ProjectionErrors> {
        if self._wards.contains_key(name) {
            return Err(ProjectionErrors::DuplicateWard(name.to_string()));
        }
        self._wards.insert(
            name.to_string(),
            Ward {
                name: name.to_string(),
                electorate,
                seats,
                current_holders: Vec::new(),
                history: Vec::new(),
            },
        );
        Ok(())
    }

    fn ward_mut(&mut self, ward: &str) -> Result<&mut Ward, ProjectionErrors> {
        self._wards
            .get_mut(ward)
            .ok_or_else(|| ProjectionErrors::UnknownWard(ward.to_string()))
    }

    pub fn add_holder(&mut self, ward: &str, name: &str, party: &str) -> Result<(), ProjectionErrors> {
        self.ward_mut(ward)?.current_holders.push(Holder {
            name: name.to_string(),
            party: party.to_string(),
        });
        Ok(())
    }

    /// Adds an ordinary election from party vote counts.
    ///
    /// It is the simplest way to describe a past result.
    pub fn add_result_simple(
        &mut self,
        ward: &str,
        year: i32,
        votes: &[(&str, u64)],
    ) -> Result<(), ProjectionErrors> {
        let best = votes.iter().map(|(_, v)| *v).max().unwrap_or(0);
        let candidates = votes
            .iter()
            .map(|(party, v)| CandidateResult {
                name: format!("{} candidate", party),
                party: party.to_string(),
                votes: Some(*v),
                share: None,
                elected: *v == best,
            })
            .collect();
        self.add_election(
            ward,
            Election {
                year,
                date: None,
                kind: ElectionKind::Ordinary,
                turnout: None,
                candidates,
            },
        )
    }

    /// Adds an election. The history is kept in chronological order.
    pub fn add_election(&mut self, ward: &str, election: Election) -> Result<(), ProjectionErrors> {
        let w = self.ward_mut(ward)?;
        w.history.push(election);
        w.history.sort_by_key(|e| e.year);
        Ok(())
    }

    /// Restricts the next election to the given wards.
    pub fn wards_up(self, wards: &[&str]) -> Result<CouncilBuilder, ProjectionErrors> {
        for w in wards {
            if !self._wards.contains_key(*w) {
                return Err(ProjectionErrors::UnknownWard(w.to_string()));
            }
        }
        let mut next = self._next.clone().unwrap_or_else(empty_next);
        next.wards_up = Some(wards.iter().map(|s| s.to_string()).collect());
        Ok(CouncilBuilder {
            _next: Some(next),
            ..self
        })
    }

    pub fn defender(self, ward: &str, holder: Holder) -> Result<CouncilBuilder, ProjectionErrors> {
        if !self._wards.contains_key(ward) {
            return Err(ProjectionErrors::UnknownWard(ward.to_string()));
        }
        let mut next = self._next.clone().unwrap_or_else(empty_next);
        next.defenders.insert(ward.to_string(), holder);
        Ok(CouncilBuilder {
            _next: Some(next),
            ..self
        })
    }

    pub fn next_election_date(self, year: Option<i32>, date: Option<String>) -> CouncilBuilder {
        let mut next = self._next.clone().unwrap_or_else(empty_next);
        next.year = year;
        next.date = date;
        CouncilBuilder {
            _next: Some(next),
            ..self
        }
    }

    pub fn build(self) -> Result<Council, ProjectionErrors> {
        if self._wards.is_empty() {
            return Err(ProjectionErrors::EmptyCouncil);
        }
        Ok(Council {
            name: self._name,
            cycle: self._cycle,
            wards: self._wards,
            next_election: self._next,
            declared_total_seats: self._declared_total_seats,
        })
    }
}

fn empty_next() -> NextElection {
    NextElection {
        year: None,
        date: None,
        wards_up: None,
        defenders: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicates_and_unknown_wards() {
        let mut b = CouncilBuilder::new("X");
        b.add_ward("A", 1, None).unwrap();
        assert_eq!(
            b.add_ward("A", 1, None),
            Err(ProjectionErrors::DuplicateWard("A".to_string()))
        );
        assert_eq!(
            b.add_holder("B", "n", "p"),
            Err(ProjectionErrors::UnknownWard("B".to_string()))
        );
        assert!(b.wards_up(&["B"]).is_err());
        assert_eq!(
            CouncilBuilder::new("Empty").build(),
            Err(ProjectionErrors::EmptyCouncil)
        );
    }

    #[test]
    fn history_is_chronological() {
        let mut b = CouncilBuilder::new("X");
        b.add_ward("A", 1, None).unwrap();
        b.add_result_simple("A", 2022, &[("P", 1)]).unwrap();
        b.add_result_simple("A", 2018, &[("Q", 1)]).unwrap();
        let c = b.build().unwrap();
        let years: Vec<i32> = c.wards["A"].history.iter().map(|e| e.year).collect();
        assert_eq!(years, vec![2018, 2022]);
    }
}
