/*!

This is the long-form manual for `fsa_crosswalk` and `dafsa`.

## Method

Census measures are published for dissemination areas (DAs). Many health and
planning datasets are keyed by forward sortation area (FSA), the first three
characters of a postal code. The two partitions do not nest: a DA may contain
postal codes of several FSAs.

The crosswalk splits each DA across its FSAs in proportion to the number of its
postal codes that fall into each FSA. A DA with 30 postal codes in `L4C` and 70
in `L4E` gets the weights 0.3 and 0.7, and a population of 100 in that DA
contributes 30 to `L4C` and 70 to `L4E`.

Two allocations are available:
* `proportional` (default) as described above
* `dominant` assigns the whole DA to the FSA that holds most of its postal codes

For categorical measures such as deprivation quintiles, `--da-counts` writes
the number of DAs of each FSA in each category, each DA being counted in its
dominant FSA (see [`crate::count_das_by_category`]).

The program checks that no amount is created or lost by the redistribution:
the total of every attribute is the same before and after.

## Input formats

Both `csv` and `xlsx` (Excel) files are supported. For Excel, the first worksheet
is used unless `excelWorksheetName` is given. The first row holds the column names.

### Membership: `counts`

```text
da_id,fsa_id,postal_code_count
35190009,L4C,30
35190009,L4E,70
```

### Membership: `postal_codes`

One row per postal code of a DA, as found in the PCCF. The FSA is derived from
the postal code and the distinct postal codes are counted.

```text
da_id,postal_code
35190009,L4C 1A2
35190009,L4E 2B1
```

### Membership: `proportions`

A precomputed table of weights. The weights of each DA must sum to 1 within
`weightTolerance`.

```text
da_id,fsa_id,weight
35190009,L4C,0.3
35190009,L4E,0.7
```

### Measures: `long`

```text
da_id,attribute,value
35190009,age_0_17_F,120
35190009,age_0_17_M,131
```

### Measures: `wide`

A DA column followed by one column per attribute. The columns listed in
`valueColumns` are used, or all the other columns if it is not specified.

```text
DA_UID,Sum of Pop
35190009,851
```

## Configuration

```json
{
  "outputSettings": {"runName": "york_durham_2021", "outputFile": "fsa_population.csv"},
  "membershipSource": {"provider": "csv", "filePath": "membership.csv", "layout": "counts"},
  "measureSources": [{"provider": "xlsx", "filePath": "population.xlsx", "layout": "wide",
                      "daColumn": "DA_UID", "excelWorksheetName": "DA x Age x Sex"}],
  "rules": {"allocation": "proportional"}
}
```

Column names default to the ones shown in the examples above. Paths are
relative to the configuration file.

 */
