//! Both planes serve their own handler on their own pool.

use std::net::SocketAddr;

use split_plane::{Handlers, Plane, Server, ServerFactory};

mod common;

fn handlers() -> Handlers {
    Handlers {
        application: common::probe_handler("application"),
        admin: common::probe_handler("admin"),
    }
}

fn first_address(server: &Server, plane: Plane) -> SocketAddr {
    server
        .routing_table()
        .plane_entries(plane)
        .next()
        .map(|entry| entry.local_addr)
        .unwrap()
}

#[test]
fn each_listener_reaches_its_planes_handler() {
    let server = ServerFactory::new(common::server_config(2, 2))
        .build(handlers())
        .unwrap();
    server.start().unwrap();

    for listener in server.listeners() {
        let (status, body) = common::http_get(listener.local_addr(), "/").unwrap();
        assert_eq!(status, 200);
        match listener.plane() {
            Plane::Application => assert_eq!(body, "application"),
            Plane::Admin => assert_eq!(body, "admin"),
        }
    }

    server.stop();
}

#[test]
fn planes_run_on_separate_pools() {
    let server = ServerFactory::new(common::server_config(1, 1))
        .build(handlers())
        .unwrap();
    server.start().unwrap();

    let app = first_address(&server, Plane::Application);
    let admin = first_address(&server, Plane::Admin);

    let (_, app_thread) = common::http_get(app, "/thread").unwrap();
    let (_, admin_thread) = common::http_get(admin, "/thread").unwrap();
    assert!(app_thread.starts_with("app-"), "served on {app_thread}");
    assert!(admin_thread.starts_with("admin-"), "served on {admin_thread}");

    server.stop();
}

#[test]
fn admin_plane_answers_while_application_pool_is_exhausted() {
    let server = ServerFactory::new(common::server_config(1, 1))
        .build(handlers())
        .unwrap();
    server.start().unwrap();

    // Hold every work permit of the application pool
    let main_pool = server.main_pool().clone();
    let permits: Vec<_> = main_pool
        .block_on({
            let pool = main_pool.clone();
            async move {
                let mut held = Vec::new();
                while pool.available_permits() > 0 {
                    held.push(pool.acquire().await.unwrap());
                }
                held
            }
        })
        .unwrap();
    assert_eq!(main_pool.available_permits(), 0);

    let admin = first_address(&server, Plane::Admin);
    let (status, body) = common::http_get(admin, "/").unwrap();
    assert_eq!((status, body.as_str()), (200, "admin"));

    drop(permits);
    server.stop();
}
