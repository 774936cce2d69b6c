use std::future::Future;
use std::net::SocketAddr;

use collective::{Communicator, Error, RankContext, local, tcp};
use futures_util::future::join_all;
use tokio::net::TcpListener;

const COUNTS: [usize; 4] = [2, 2, 1, 0];
const OFFSETS: [usize; 4] = [0, 2, 4, 5];

async fn run_group<C, F, Fut, T>(comms: Vec<C>, f: F) -> Vec<Result<T, Error>>
where
    C: Communicator + 'static,
    F: Fn(C) -> Fut,
    Fut: Future<Output = Result<T, Error>> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = comms.into_iter().map(|comm| tokio::spawn(f(comm))).collect();
    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect()
}

async fn start_tcp_group(size: usize) -> Vec<tcp::TcpCommunicator> {
    let mut listeners = Vec::new();
    let mut addrs: Vec<SocketAddr> = Vec::new();
    for _ in 0..size {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        addrs.push(listener.local_addr().unwrap());
        listeners.push(listener);
    }

    let handles: Vec<_> = listeners
        .into_iter()
        .enumerate()
        .map(|(rank, listener)| {
            let addrs = addrs.clone();
            tokio::spawn(async move {
                let ctx = RankContext::new(rank, size).unwrap();
                tcp::establish(ctx, listener, &addrs).await.unwrap()
            })
        })
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect()
}

/// Broadcast, uneven scatter, gather and barrier in the order a real run uses them.
async fn exercise<C: Communicator>(comm: C) -> Result<(Vec<f64>, Vec<f64>, Option<Vec<f64>>), Error> {
    let ctx = comm.context();
    let root = ctx.is_root(0);

    let mut shared = if root { vec![3.0, 1.0, 4.0] } else { vec![0.0; 3] };
    comm.broadcast(&mut shared, 0).await?;

    let source: Vec<f64> = (0..5).map(|v| v as f64).collect();
    let mut block = vec![0.0; COUNTS[ctx.rank()]];
    let send = if root { Some(source.as_slice()) } else { None };
    comm.scatter_variable(send, &COUNTS, &OFFSETS, &mut block, 0)
        .await?;
    comm.barrier().await?;

    let doubled: Vec<f64> = block.iter().map(|v| v * 2.0).collect();
    let mut gathered = if root { Some(vec![-1.0; 5]) } else { None };
    comm.gather_variable(&doubled, gathered.as_deref_mut(), &COUNTS, &OFFSETS, 0)
        .await?;
    comm.barrier().await?;

    Ok((shared, block, gathered))
}

fn check_exercise(results: Vec<Result<(Vec<f64>, Vec<f64>, Option<Vec<f64>>), Error>>) {
    let expected_blocks: [&[f64]; 4] = [&[0.0, 1.0], &[2.0, 3.0], &[4.0], &[]];
    for (rank, result) in results.into_iter().enumerate() {
        let (shared, block, gathered) = result.unwrap();
        assert_eq!(shared, vec![3.0, 1.0, 4.0]);
        assert_eq!(block, expected_blocks[rank]);
        if rank == 0 {
            assert_eq!(gathered, Some(vec![0.0, 2.0, 4.0, 6.0, 8.0]));
        } else {
            assert_eq!(gathered, None);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_local_collectives() {
    let results = run_group(local::group(4).unwrap(), exercise).await;
    check_exercise(results);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tcp_collectives() {
    let comms = start_tcp_group(4).await;
    let results = run_group(comms, exercise).await;
    check_exercise(results);
}

#[tokio::test]
async fn test_non_zero_root() {
    let results = run_group(local::group(3).unwrap(), |comm| async move {
        let mut buf = if comm.context().is_root(2) { vec![9.0] } else { vec![0.0] };
        comm.broadcast(&mut buf, 2).await?;
        Ok(buf)
    })
    .await;
    for result in results {
        assert_eq!(result.unwrap(), vec![9.0]);
    }
}

#[tokio::test]
async fn test_scatter_rejects_short_receive_buffer() {
    let comm = local::group(2).unwrap().remove(1);
    let mut recv = vec![0.0; 1];
    let err = comm
        .scatter_variable(None, &[2, 2], &[0, 2], &mut recv, 0)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::SizeMismatch {
            expected: 2,
            actual: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn test_broadcast_length_disagreement_is_detected() {
    let results = run_group(local::group(2).unwrap(), |comm| async move {
        let len = if comm.context().is_root(0) { 4 } else { 3 };
        let mut buf = vec![1.0; len];
        comm.broadcast(&mut buf, 0).await
    })
    .await;
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(Error::SizeMismatch {
            op: "broadcast",
            expected: 3,
            actual: 4
        })
    ));
}

#[tokio::test]
async fn test_invalid_root_is_rejected() {
    let comm = local::group(2).unwrap().remove(0);
    let mut buf = vec![0.0];
    let err = comm.broadcast(&mut buf, 2).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRoot { root: 2, size: 2 }));
}
