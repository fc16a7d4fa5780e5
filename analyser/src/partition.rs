use itertools::Itertools as _;
use polars::prelude::{col, lit, AnyValue, DataFrame, DataType, Expr, IntoLazy, UniqueKeepStrategy};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug)]
pub enum Partition {
    Unpartitioned,
    Partitioned(BTreeMap<String, DataFrame>),
}

/// Split the [`DataFrame`] into one sub-frame per combination of values of the `tags` columns.
///
/// Each sub-frame is keyed by its `tag=value` pairs joined with `,`, e.g.
/// `network_type=inter,deviation=low`. Without tags the result is [`Partition::Unpartitioned`].
/// Tag names must be non-empty, unique, and name string columns of the frame.
pub fn partition_by_tags(data_frame: DataFrame, tags: &[&str]) -> anyhow::Result<Partition> {
    check_tags(&data_frame, tags)?;
    if tags.is_empty() {
        return Ok(Partition::Unpartitioned);
    }

    let combinations = data_frame
        .clone()
        .lazy()
        .select(tags.iter().map(|&tag| col(tag)).collect::<Vec<_>>())
        .unique(
            Some(tags.iter().map(|tag| tag.to_string()).collect()),
            UniqueKeepStrategy::First,
        )
        .collect()?;

    let mut partitioned = BTreeMap::new();
    for row in 0..combinations.height() {
        let mut values = Vec::with_capacity(tags.len());
        for &tag in tags {
            // null tags match no filter, their rows fall out of every partition
            let Some(value) = string_value(combinations.column(tag)?.get(row)?) else {
                log::debug!("Skipping null {tag} in row {row}");
                continue;
            };
            values.push((tag, value));
        }
        if values.len() != tags.len() {
            continue;
        }

        let key = values
            .iter()
            .map(|(tag, value)| format!("{tag}={value}"))
            .join(",");
        let Some(filter) = values
            .into_iter()
            .map(|(tag, value)| col(tag).eq(lit(value)))
            .reduce(Expr::and)
        else {
            continue;
        };

        let sub_frame = data_frame.clone().lazy().filter(filter).collect()?;
        log::trace!("Partition {key} has {} rows", sub_frame.height());
        partitioned.insert(key, sub_frame);
    }

    Ok(Partition::Partitioned(partitioned))
}

fn check_tags(data_frame: &DataFrame, tags: &[&str]) -> anyhow::Result<()> {
    let mut seen = HashSet::with_capacity(tags.len());
    for &tag in tags {
        if tag.is_empty() {
            anyhow::bail!("Empty tag name");
        }
        if !seen.insert(tag) {
            anyhow::bail!("Duplicate tag name found: {tag}");
        }
        let dtype = data_frame.column(tag)?.dtype();
        if *dtype != DataType::String {
            anyhow::bail!("Tag column {tag} must hold strings, found {dtype}");
        }
    }
    Ok(())
}

fn string_value(value: AnyValue) -> Option<String> {
    match value {
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        _ => None,
    }
}

/// The value of `tag` in a partition key built by [partition_by_tags].
pub fn tag_value<'a>(key: &'a str, tag: &str) -> Option<&'a str> {
    key.split(',')
        .filter_map(|part| part.split_once('='))
        .find(|(name, _)| *name == tag)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::df;
    use pretty_assertions::assert_eq;

    fn differences() -> DataFrame {
        df! [
            "network_type" => ["intra", "intra", "inter", "inter", "intra", "inter"],
            "deviation"    => ["low", "high+", "low", "high-", "low", "high+"],
            "diff"         => [1.,  4.,  -2.,  -5.,  0.5,  6.],
        ]
        .unwrap()
    }

    fn keys(partition: &Partition) -> Vec<&str> {
        match partition {
            Partition::Unpartitioned => Vec::new(),
            Partition::Partitioned(map) => map.keys().map(String::as_str).collect(),
        }
    }

    #[test]
    fn no_tags_is_unpartitioned() -> anyhow::Result<()> {
        assert!(matches!(
            partition_by_tags(differences(), &[])?,
            Partition::Unpartitioned
        ));
        Ok(())
    }

    #[test]
    fn bad_tags_are_errors() {
        let frame = differences();
        assert!(partition_by_tags(frame.clone(), &["section"]).is_err());
        assert!(partition_by_tags(frame.clone(), &["deviation", "deviation"]).is_err());
        assert!(partition_by_tags(frame.clone(), &["deviation", ""]).is_err());
        assert!(partition_by_tags(frame, &["diff"]).is_err());
    }

    #[test]
    fn one_partition_per_network_type() -> anyhow::Result<()> {
        let partition = partition_by_tags(differences(), &["network_type"])?;
        assert_eq!(keys(&partition), vec!["network_type=inter", "network_type=intra"]);

        let Partition::Partitioned(partitioned) = partition else {
            panic!("Expected partitions");
        };
        assert_eq!(partitioned["network_type=intra"].height(), 3);
        let diffs = partitioned["network_type=inter"]
            .column("diff")?
            .f64()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        assert_eq!(diffs, vec![-2., -5., 6.]);
        Ok(())
    }

    #[test]
    fn combined_tags() -> anyhow::Result<()> {
        let Partition::Partitioned(partitioned) =
            partition_by_tags(differences(), &["network_type", "deviation"])?
        else {
            panic!("Expected partitions");
        };

        assert_eq!(partitioned.len(), 5);
        assert_eq!(partitioned["network_type=intra,deviation=low"].height(), 2);
        assert_eq!(partitioned["network_type=inter,deviation=high-"].height(), 1);
        Ok(())
    }

    #[test]
    fn tag_value_from_key() {
        assert_eq!(
            tag_value("network_type=inter,deviation=high+", "deviation"),
            Some("high+")
        );
        assert_eq!(tag_value("network_type=inter", "deviation"), None);
    }
}
