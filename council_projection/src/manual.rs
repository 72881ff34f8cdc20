/*!

This is the long-form manual for `council_projection` and `wardcast`.

## Input documents

`wardcast` reads up to six JSON documents. Only the election history is required.

* `history`: the election history of one council
* `reference`: national baseline, model parameters, party aliases and the election calendar
* `polling`: the current national polling aggregate
* `demographics`, `deprivation`: local indicators keyed by ward name
* `lgr`: proposed reorganisation models

### `history`

```text
{ "meta": { "totalSeats": 45, "totalWards": 15, "electionCycle": "thirds",
            "nextElection": { "date": "2026-05-07", "seatsUp": 15,
                              "wardsUp": ["Abbey", "..."],
                              "defenders": { "Abbey": { "name": "Jo Bloggs", "party": "Labour" } } } },
  "wards": { "Abbey": { "electorate": 6500, "seats": 3,
                        "currentHolders": [ { "name": "Jo Bloggs", "party": "Labour" } ],
                        "history": [ { "year": 2024, "type": "thirds", "turnout": 0.31,
                                       "candidates": [ { "name": "Jo Bloggs", "party": "Labour",
                                                         "votes": 1200, "elected": true } ] } ] } },
  "councilHistory": [ ... ] }
```

Several fields accept alternative names (`seats`/`seatCount`, `currentHolders`/`councillors`,
`type`/`electionType`, `share`/`pct`, ...). A turnout above 1 is read as a percentage.
Shares are read per set (one poll, one election, one proxy): the whole set is in percent
when any share is above 1 or the shares add up to well over 1. Trend and swing deltas
are in percentage points when any of them is above 1 in size.

### `polling`

```text
{ "aggregate": { "Labour": 0.28 }, "trend30d": { "Labour": -0.01 },
  "individualPolls": [ { "pollster": "X", "date": "2026-04-01", "weight": 1.0,
                         "shares": { "Labour": 0.27 } } ],
  "swingFromBaseline": { "Labour": -0.06 } }
```

When `aggregate` is missing the weighted average of `individualPolls` is used. When the
reference document has no baseline, `swingFromBaseline` is used directly as the swing.

### `lgr`

```text
{ "proposedModels": [ { "id": "two-unitary", "name": "Two unitaries", "source": "...",
                        "authorities": [ { "name": "North", "councils": ["Stafford", "..."],
                                           "wards": [] } ] } ] }
```

## The model

1. **Swing**: `(current - baseline) * swing multiplier * dampening`. A party absent
   from the baseline has all of its current share counted as swing.
2. **Ward prediction**: the most recent comparable (non by-election) result is the
   baseline, the swing is applied and shares renormalised. Parties assumed to enter
   every contest are seeded from the constituency proxy. Demographic coefficients,
   proxy blending and an incumbency effect are optional further steps. Each step is
   recorded in the methodology trail of the prediction.
3. **Confidence**: `high` for a margin above the high cutoff built from local data
   only, `low` for a thin margin or sparse history, `medium` otherwise, `none` when
   the ward has no usable history.
4. **Seats**: held seats plus the predicted winners of the seats up. Under thirds each
   contested ward puts up a single seat.
5. **Coalitions**: the majority threshold is `floor(seats / 2) + 1`. Only the smallest
   coalitions are listed: a coalition that already has a majority is not extended.
6. **Reorganisation**: seats are re-summed per proposed authority. An authority that
   also absorbs other councils is only partially known and is labelled as such.

> Note: these are illustrative projections, not forecasts.

## Configuration

`wardcast --config config.json` reads the document paths, the assumptions and the
overrides from a JSON file:

```text
{ "documents": { "history": "history.json", "reference": "reference.json",
                 "polling": "polling.json" },
  "assumptions": { "swingMultiplier": 1.0, "turnoutAdjustment": 0.0,
                   "newEntrants": ["Reform UK"] },
  "overrides": { "Abbey": "Green" },
  "output": "stdout" }
```

Paths are relative to the configuration file. Command line flags take precedence.

 */
