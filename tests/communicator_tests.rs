use halo_diffusion::algs::communicator::{CommTag, Communicator, LocalUniverse, Wait};

#[test]
fn thread_round_trip() {
    let tag = CommTag(0x1000);
    let universe = LocalUniverse::new(2);
    let (c0, c1) = (universe.comm(0), universe.comm(1));

    let msg = b"hello";
    let mut s = c0.isend(1, tag.base(), msg);
    assert!(!s.test(), "send completes only once matched");

    let mut buf = [0u8; 5];
    let h = c1.irecv(0, tag.base(), &mut buf);
    let got = h.wait().unwrap();
    assert_eq!(&got, msg);
    assert!(s.test());
    assert_eq!(universe.pending_messages(), 0);
}

#[test]
fn fifo_order_per_key() {
    let tag = CommTag(0x1001);
    let universe = LocalUniverse::new(2);
    let (c0, c1) = (universe.comm(0), universe.comm(1));

    let sends: Vec<_> = (0..10u8).map(|i| c0.isend(1, tag.base(), &[i])).collect();
    let mut out = Vec::new();
    for _ in 0..10 {
        let mut b = [0u8; 1];
        let h = c1.irecv(0, tag.base(), &mut b);
        out.push(h.wait().unwrap()[0]);
    }
    assert_eq!(out, (0u8..10u8).collect::<Vec<_>>());
    for s in sends {
        assert_eq!(s.wait(), None);
    }
}

#[test]
fn tags_do_not_mix() {
    let tag = CommTag(0x2000);
    let universe = LocalUniverse::new(2);
    let (c0, c1) = (universe.comm(0), universe.comm(1));

    let _a = c0.isend(1, tag.offset(0), b"a");
    let _b = c0.isend(1, tag.offset(1), b"b");

    let mut buf = [0u8; 1];
    let got_b = c1.irecv(0, tag.offset(1), &mut buf).wait().unwrap();
    let got_a = c1.irecv(0, tag.offset(0), &mut buf).wait().unwrap();
    assert_eq!(got_b, b"b");
    assert_eq!(got_a, b"a");
}

#[test]
fn sources_do_not_mix() {
    let tag = CommTag(0x2001);
    let universe = LocalUniverse::new(3);
    let (c0, c1, c2) = (universe.comm(0), universe.comm(1), universe.comm(2));

    let _from0 = c0.isend(2, tag.base(), &[0]);
    let _from1 = c1.isend(2, tag.base(), &[1]);

    let mut buf = [0u8; 1];
    assert_eq!(c2.irecv(1, tag.base(), &mut buf).wait().unwrap(), vec![1]);
    assert_eq!(c2.irecv(0, tag.base(), &mut buf).wait().unwrap(), vec![0]);
}

#[test]
fn truncation_is_ok() {
    let tag = CommTag(0x1002);
    let universe = LocalUniverse::new(2);
    let (c0, c1) = (universe.comm(0), universe.comm(1));

    let _s = c0.isend(1, tag.base(), b"abcdef");
    let mut buf = [0u8; 3];
    let got = c1.irecv(0, tag.base(), &mut buf).wait().unwrap();
    assert_eq!(&got, b"abc");
}

#[test]
fn messages_cross_threads() {
    let tag = CommTag(0x3000);
    let universe = LocalUniverse::new(2);
    std::thread::scope(|s| {
        let comms = universe.comms();
        let mut it = comms.into_iter();
        let (c0, c1) = (it.next().unwrap(), it.next().unwrap());
        s.spawn(move || {
            for i in 0..100u8 {
                c0.isend(1, tag.base(), &[i]).wait();
            }
            c0.barrier();
        });
        s.spawn(move || {
            for i in 0..100u8 {
                let mut b = [0u8; 1];
                assert_eq!(c1.irecv(0, tag.base(), &mut b).wait().unwrap(), vec![i]);
            }
            c1.barrier();
        });
    });
    assert_eq!(universe.pending_messages(), 0);
}

#[test]
fn abort_unblocks_a_lonely_receiver() {
    let tag = CommTag(0x3001);
    let universe = LocalUniverse::new(2);
    let c1 = universe.comm(1);
    std::thread::scope(|s| {
        let h = s.spawn(move || {
            let mut b = [0u8; 8];
            c1.irecv(0, tag.base(), &mut b).wait()
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        universe.abort();
        assert_eq!(h.join().unwrap(), None);
    });
}
