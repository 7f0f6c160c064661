use anyhow::{ensure, Result};
use pipeflow_pipe::{row, Error, FieldList, Pipe, Record, Row, Value};
use rand::prelude::*;
use std::{sync::mpsc, thread, time::Duration};

fn produce(pipe: Pipe, rows: Vec<Row>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for row in rows {
            pipe.put(row);
        }
        pipe.flush();
    })
}

#[test]
fn capacity_three_depth_one() -> Result<()> {
    let pipe = Pipe::new(3, 1);
    let producer = produce(pipe.clone(), (1..=5).map(|n| row![n]).collect());

    let observed: Vec<_> = pipe.rows().collect();
    producer.join().unwrap();

    ensure!(observed == (1..=5).map(|n| row![n]).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn delivery_is_batching_transparent() -> Result<()> {
    let mut rng = rand::thread_rng();

    for _ in 0..20 {
        let capacity = rng.gen_range(1..=16);
        let depth = rng.gen_range(0..=3);
        let count = rng.gen_range(0..=200);

        let rows: Vec<Row> = (0..count)
            .map(|index| row![index, rng.gen::<f64>()])
            .collect();

        let pipe = Pipe::new(capacity, depth);
        let producer = produce(pipe.clone(), rows.clone());
        let observed: Vec<_> = pipe.rows().collect();
        producer.join().unwrap();

        ensure!(
            observed == rows,
            "rows differ with capacity {} and depth {}",
            capacity,
            depth
        );
    }

    Ok(())
}

#[test]
fn stop_releases_blocked_producer() -> Result<()> {
    let pipe = Pipe::new(1, 1);
    let (done_tx, done_rx) = mpsc::channel();

    let producer = {
        let pipe = pipe.clone();
        thread::spawn(move || {
            for n in 0..100 {
                pipe.put(row![n]);
            }
            pipe.flush();
            done_tx.send(()).unwrap();
        })
    };

    // let the producer fill the queue and block on the next hand-off
    thread::sleep(Duration::from_millis(50));
    ensure!(done_rx.try_recv().is_err(), "producer should be blocked");

    pipe.stop();
    ensure!(
        done_rx.recv_timeout(Duration::from_secs(5)).is_ok(),
        "producer stayed blocked after stop"
    );
    producer.join().unwrap();

    ensure!(pipe.is_closed());
    ensure!(pipe.queued_batches() == 0);
    Ok(())
}

#[test]
fn consumer_stops_midway() -> Result<()> {
    let pipe = Pipe::new(4, 1);
    let producer = produce(pipe.clone(), (0..10_000).map(|n| row![n]).collect());

    let head: Vec<_> = pipe.rows().take(10).collect();
    pipe.stop();
    producer.join().unwrap();

    ensure!(head == (0..10).map(|n| row![n]).collect::<Vec<_>>());
    ensure!(pipe.queued_batches() == 0);
    ensure!(pipe.rows().next().is_none());
    Ok(())
}

#[test]
fn records_require_fields() -> Result<()> {
    let pipe = Pipe::default();
    pipe.put(row![1, "one"]);
    pipe.flush();

    let err = pipe.records().unwrap_err();
    ensure!(matches!(err, Error::MissingFields { .. }));

    let err = pipe.put_record(&Record::new()).unwrap_err();
    ensure!(matches!(err, Error::MissingFields { .. }));
    Ok(())
}

#[test]
fn empty_field_list_counts_as_missing() -> Result<()> {
    let pipe = Pipe::default();
    pipe.set_fields(FieldList::default())?;
    ensure!(matches!(pipe.records(), Err(Error::MissingFields { .. })));
    Ok(())
}

#[test]
fn record_round_trip_fills_nulls() -> Result<()> {
    let pipe = Pipe::new(2, 0);
    pipe.set_fields(FieldList::new(["id", "name", "amount"])?)?;

    let mut record = Record::new();
    record.insert("amount".into(), Value::Float(9.5));
    record.insert("id".into(), Value::Integer(7));
    record.insert("ignored".into(), Value::Bool(true));
    pipe.put_record(&record)?;
    pipe.flush();

    let records: Vec<_> = pipe.records()?.collect();
    ensure!(records.len() == 1);

    let record = &records[0];
    ensure!(record.keys().collect::<Vec<_>>() == ["id", "name", "amount"]);
    ensure!(record["id"] == Value::Integer(7));
    ensure!(record["name"] == Value::Null);
    ensure!(record["amount"] == Value::Float(9.5));
    Ok(())
}
