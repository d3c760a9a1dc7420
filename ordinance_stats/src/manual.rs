/*!

This is the long-form manual for `ordinance_stats` and `ordstats`.

## Input

The input is a table with one row per ordinance. The following columns are read:

| column          | required | meaning                                                    |
|-----------------|----------|------------------------------------------------------------|
| `province`      | yes      | the top-level jurisdiction                                 |
| `municipality`  | yes      | the enacting jurisdiction; equal to `province` for the province itself |
| `subjectField`  | yes      | the topic of the ordinance                                 |
| `councilTerm`   | yes      | the council term label, for example `Council Term 8`       |
| `delegationRaw` | yes      | whether the ordinance implements a higher-level mandate    |
| `enactmentDate` | no       | the date of enactment                                      |

The names above are the defaults. The Korean profile reads `광역`, `기초`, `최종분야`,
`지방의회_기수` and `의결일자`.

The delegation column does not need an exact name: when `delegationRaw` is absent, the
first column whose normalized header contains one of the keywords (`위임`, `delegat`,
`mandate`) is used.

### Delegation values

- booleans are used as they are
- numbers are delegated when they are not zero
- text is trimmed, lowercased and looked up in the true tokens
  (`true`, `t`, `y`, `yes`, `1`, `위임`, `o`) then in the false tokens
  (`false`, `f`, `n`, `no`, `0`, `자치`, `x`)
- empty cells and any other text count as autonomous

Text found in neither token set is counted in the `defaulted` diagnostic, with the tokens
themselves, so that unexpected spellings can be found.

### Council terms

The first run of digits of the label gives the ordinal of the term. Labels containing
an unclassifiable marker (`unclassifiable`, `분류불가`) get the ordinal 0, and labels
without digits get 999 and are counted in the diagnostics.

### Dates

Dates can be written `2019-05-01`, `2019.05.01`, `2019/05/01` or `20190501`, or be
spreadsheet dates. Unreadable dates are counted and the record keeps no date.

## Views

A view groups the filtered records along two dimensions (`province`, `municipality`,
`subjectField`, `councilTerm`, `delegation`, `enactmentYear`) or ranks the enacting
entities.

Filters:
- `province`: a province, with its former names unless `aliasInclusive` is false
- `subjectFields`, `councilTerms`: lists of accepted values
- `dateFrom`, `dateTo`: inclusive bounds; records without a date are excluded
- `delegation`: `all`, `delegatedOnly` or `autonomousOnly`
- `entities`: `combined`, `subUnits` (municipalities only) or `topLevel` (provinces only)

For every row of a cross-tab the derived metrics are the shares of each column in percent,
the percentage-point growth from the previous row in natural order, the growth of the row
total, and the concentration index (population standard deviation of the shares).

The growth of the row total is left empty after a row with no ordinance, instead of
being infinite, and the mean total growth only averages the defined values. Rows in
natural order follow the term number (or the year), then the name.

`--top-n` only hides rows: growth is still computed between neighbouring rows of the
complete cross-tab.

### Presets

| preset             | parameter        | view                                                    |
|--------------------|------------------|---------------------------------------------------------|
| `termProvinces`    | term number      | provinces by subject field for one council term         |
| `provinceTrend`    | province         | council terms by subject field for one province        |
| `municipalities`   | province         | municipalities of one province by subject field         |
| `nationalTrend`    |                  | council terms by subject field, nationwide             |
| `delegationShares` |                  | share of delegated ordinances per province              |
| `ranking`          | scope (optional) | entities by number of ordinances                        |

The `municipalities` preset leaves the province's own ordinances out. Write the parameter
as `경기도:withTopLevel` to keep them as a row of their own.

## Configuration

`ordstats` accepts a JSON configuration file:

```text
{
  "profile": "korean",
  "input": {"filePath": "ordinances.xlsx", "excelWorksheetName": "Sheet1"},
  "blankFields": "drop",
  "aliases": [{"canonical": "전북특별자치도", "aliases": ["전라북도"]}],
  "views": [
    {"preset": "provinceTrend", "param": "강원특별자치도"},
    {"rowDimension": "municipality", "province": "경기도", "entities": "subUnits",
     "ratioMode": "percentage", "topN": 10},
    {"ranking": "subUnits"}
  ]
}
```

The `columns`, `terms` and `classifier` sections override the names, the council term
labels and the token sets of the profile. Command line options override the input and
the views of the file.

 */
